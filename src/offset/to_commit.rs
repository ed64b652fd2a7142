use std::collections::{HashMap, HashSet};

use crate::types::{SubscriptionName, SubscriptionPartitionOffset};

/// Offsets chosen for commit in one committer run, grouped by subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetsToCommit {
    offsets: HashMap<SubscriptionName, HashSet<SubscriptionPartitionOffset>>,
}

impl OffsetsToCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, offset: SubscriptionPartitionOffset) -> &mut Self {
        self.offsets
            .entry(offset.subscription_name().clone())
            .or_default()
            .insert(offset);
        self
    }

    pub fn subscription_names(&self) -> impl Iterator<Item = &SubscriptionName> {
        self.offsets.keys()
    }

    pub fn batch_for(
        &self,
        subscription: &SubscriptionName,
    ) -> Option<&HashSet<SubscriptionPartitionOffset>> {
        self.offsets.get(subscription)
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Total number of partition offsets across all subscriptions.
    pub fn len(&self) -> usize {
        self.offsets.values().map(HashSet::len).sum()
    }
}
