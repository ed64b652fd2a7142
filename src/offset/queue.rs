use crossbeam::queue::SegQueue;

use crate::types::SubscriptionPartitionOffset;

/// Channels through which dispatch workers report offset state to the committer.
///
/// Producers on any thread offer events without blocking; the committer drains
/// both queues once per run.
#[derive(Debug, Default)]
pub struct OffsetQueue {
    inflight_offsets: SegQueue<SubscriptionPartitionOffset>,
    committed_offsets: SegQueue<SubscriptionPartitionOffset>,
}

impl OffsetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a message dispatched but not yet acknowledged.
    pub fn offer_inflight_offset(&self, offset: SubscriptionPartitionOffset) {
        self.inflight_offsets.push(offset);
    }

    /// Report a message acknowledged by the subscriber.
    pub fn offer_committed_offset(&self, offset: SubscriptionPartitionOffset) {
        self.committed_offsets.push(offset);
    }

    pub fn drain_inflight_offsets<F>(&self, consumer: F) -> usize
    where
        F: FnMut(SubscriptionPartitionOffset),
    {
        drain(&self.inflight_offsets, consumer)
    }

    pub fn drain_committed_offsets<F>(&self, consumer: F) -> usize
    where
        F: FnMut(SubscriptionPartitionOffset),
    {
        drain(&self.committed_offsets, consumer)
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight_offsets.len()
    }

    pub fn committed_len(&self) -> usize {
        self.committed_offsets.len()
    }
}

// Bounded by the length seen on entry so a drain terminates while producers keep pushing.
fn drain<F>(queue: &SegQueue<SubscriptionPartitionOffset>, mut consumer: F) -> usize
where
    F: FnMut(SubscriptionPartitionOffset),
{
    let snapshot = queue.len();
    let mut drained = 0;
    while drained < snapshot {
        match queue.pop() {
            Some(offset) => {
                consumer(offset);
                drained += 1;
            }
            None => break,
        }
    }
    drained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubscriptionName;
    use std::sync::Arc;

    fn offset(offset: i64) -> SubscriptionPartitionOffset {
        SubscriptionPartitionOffset::of(SubscriptionName::new("orders", "billing"), 0, offset)
    }

    #[test]
    fn test_drain_preserves_arrival_order_and_empties_queue() {
        let queue = OffsetQueue::new();
        queue.offer_committed_offset(offset(3));
        queue.offer_committed_offset(offset(1));
        queue.offer_committed_offset(offset(2));

        let mut seen = Vec::new();
        let drained = queue.drain_committed_offsets(|o| seen.push(o.offset()));

        assert_eq!(drained, 3);
        assert_eq!(seen, vec![3, 1, 2]);
        assert_eq!(queue.committed_len(), 0);
    }

    #[test]
    fn test_drain_empty_queue_returns_immediately() {
        let queue = OffsetQueue::new();
        let drained = queue.drain_inflight_offsets(|_| panic!("nothing to drain"));
        assert_eq!(drained, 0);
    }

    #[test]
    fn test_queues_are_independent() {
        let queue = OffsetQueue::new();
        queue.offer_inflight_offset(offset(10));
        queue.offer_committed_offset(offset(5));

        assert_eq!(queue.inflight_len(), 1);
        assert_eq!(queue.committed_len(), 1);

        let mut inflight = Vec::new();
        queue.drain_inflight_offsets(|o| inflight.push(o.offset()));
        assert_eq!(inflight, vec![10]);
        assert_eq!(queue.committed_len(), 1);
    }

    #[test]
    fn test_concurrent_producers_lose_nothing_across_drains() {
        let queue = Arc::new(OffsetQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|worker| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        queue.offer_inflight_offset(offset(worker * 1000 + i));
                    }
                })
            })
            .collect();

        let mut total = 0;
        while producers.iter().any(|p| !p.is_finished()) {
            total += queue.drain_inflight_offsets(|_| {});
        }
        for producer in producers {
            producer.join().unwrap();
        }
        total += queue.drain_inflight_offsets(|_| {});

        assert_eq!(total, 4000);
    }
}
