use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::types::{Offset, SubscriptionPartition, SubscriptionPartitionOffset};

/// Binary associative reduction over offsets, e.g. `std::cmp::max`.
pub type OffsetReductor = fn(Offset, Offset) -> Offset;
pub type OffsetModifier = fn(Offset) -> Offset;

fn identity(offset: Offset) -> Offset {
    offset
}

/// Folds a stream of offset events into one offset per subscription partition.
///
/// Every accepted event is transformed by the modifier (identity unless set) and
/// combined with the value already held for its partition using the reductor.
/// The raw events are kept as well, so callers can reuse them as a set.
///
/// Not safe for concurrent use; one instance drains one queue at a time.
pub struct ReducingConsumer {
    reductor: OffsetReductor,
    modifier: OffsetModifier,
    reduced: HashMap<SubscriptionPartition, Offset>,
    all: HashSet<SubscriptionPartitionOffset>,
}

impl ReducingConsumer {
    pub fn new(reductor: OffsetReductor) -> Self {
        Self::with_modifier(reductor, identity)
    }

    pub fn with_modifier(reductor: OffsetReductor, modifier: OffsetModifier) -> Self {
        Self {
            reductor,
            modifier,
            reduced: HashMap::new(),
            all: HashSet::new(),
        }
    }

    /// Subsequent `accept` calls use the offsets unmodified.
    pub fn reset_modifier(&mut self) {
        self.modifier = identity;
    }

    pub fn accept(&mut self, offset: SubscriptionPartitionOffset) {
        let value = (self.modifier)(offset.offset());

        match self.reduced.entry(offset.subscription_partition().clone()) {
            Entry::Occupied(mut entry) => {
                let current = *entry.get();
                entry.insert((self.reductor)(current, value));
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }

        self.all.insert(offset);
    }

    pub fn reduced(&self) -> &HashMap<SubscriptionPartition, Offset> {
        &self.reduced
    }

    pub fn all(&self) -> &HashSet<SubscriptionPartitionOffset> {
        &self.all
    }

    pub fn into_parts(
        self,
    ) -> (
        HashMap<SubscriptionPartition, Offset>,
        HashSet<SubscriptionPartitionOffset>,
    ) {
        (self.reduced, self.all)
    }
}
