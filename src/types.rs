use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RustMqError;

pub type TopicName = String;
pub type PartitionId = u32;
/// Position in a partition log. Negative values are sentinels and never committed.
pub type Offset = i64;

const SUBSCRIPTION_SEPARATOR: char = '$';

/// Subscription qualified by the topic it consumes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionName {
    pub topic: TopicName,
    pub name: String,
}

impl SubscriptionName {
    pub fn new(topic: impl Into<TopicName>, name: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            name: name.into(),
        }
    }

    /// Qualified `topic$name` form.
    pub fn qualified_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SubscriptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.topic, SUBSCRIPTION_SEPARATOR, self.name)
    }
}

impl FromStr for SubscriptionName {
    type Err = RustMqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SUBSCRIPTION_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(topic), Some(name), None) if !topic.is_empty() && !name.is_empty() => {
                Ok(Self::new(topic, name))
            }
            _ => Err(RustMqError::InvalidSubscriptionName(format!(
                "expected <topic>{}<subscription>, got '{}'",
                SUBSCRIPTION_SEPARATOR, s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionPartition {
    pub subscription: SubscriptionName,
    pub partition: PartitionId,
}

impl SubscriptionPartition {
    pub fn new(subscription: SubscriptionName, partition: PartitionId) -> Self {
        Self {
            subscription,
            partition,
        }
    }
}

impl fmt::Display for SubscriptionPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subscription, self.partition)
    }
}

/// A single offset event for a subscription partition. Equality includes the
/// offset, so two offsets of one partition are distinct set members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionPartitionOffset {
    subscription_partition: SubscriptionPartition,
    offset: Offset,
}

impl SubscriptionPartitionOffset {
    pub fn new(subscription_partition: SubscriptionPartition, offset: Offset) -> Self {
        Self {
            subscription_partition,
            offset,
        }
    }

    pub fn of(subscription: SubscriptionName, partition: PartitionId, offset: Offset) -> Self {
        Self::new(SubscriptionPartition::new(subscription, partition), offset)
    }

    pub fn subscription_partition(&self) -> &SubscriptionPartition {
        &self.subscription_partition
    }

    pub fn subscription_name(&self) -> &SubscriptionName {
        &self.subscription_partition.subscription
    }

    pub fn partition(&self) -> PartitionId {
        self.subscription_partition.partition
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }
}

impl fmt::Display for SubscriptionPartitionOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.subscription_partition, self.offset)
    }
}
