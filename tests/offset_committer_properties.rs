//! Property-based tests for the offset commit decisions.
//!
//! A simulated dispatcher sends messages of each partition in order, reports
//! them inflight, and acknowledges random subsets later. The committer must
//! never commit past an unacknowledged message and must never move a
//! partition's commit position backwards.

use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustmq_offsets::config::OffsetCommitterConfig;
use rustmq_offsets::metrics::OffsetCommitterMetrics;
use rustmq_offsets::offset::{MessageCommitter, OffsetCommitter, OffsetQueue, OffsetsToCommit};
use rustmq_offsets::types::*;
use rustmq_offsets::Result;

const PARTITIONS: u32 = 3;

#[derive(Default)]
struct RecordingCommitter {
    commits: Mutex<Vec<HashMap<SubscriptionPartition, Offset>>>,
}

#[async_trait]
impl MessageCommitter for RecordingCommitter {
    async fn commit_offsets(&self, offsets: OffsetsToCommit) -> Result<()> {
        let flattened = offsets
            .subscription_names()
            .filter_map(|name| offsets.batch_for(name))
            .flatten()
            .map(|o| (o.subscription_partition().clone(), o.offset()))
            .collect();
        self.commits.lock().push(flattened);
        Ok(())
    }
}

/// Per-partition dispatch state of the simulated subscriber.
#[derive(Default)]
struct PartitionDispatch {
    next_offset: Offset,
    unacknowledged: BTreeSet<Offset>,
}

impl PartitionDispatch {
    /// Lowest offset that is not safe to skip on restart.
    fn resume_bound(&self) -> Offset {
        self.unacknowledged
            .iter()
            .next()
            .copied()
            .unwrap_or(self.next_offset)
    }
}

/// One run worth of events for one partition: how many new messages to send
/// and which currently unacknowledged messages get acknowledged (by rank).
#[derive(Debug, Clone)]
struct PartitionStep {
    dispatched: usize,
    acknowledged: Vec<prop::sample::Index>,
}

fn partition_step() -> impl Strategy<Value = PartitionStep> {
    (0usize..6, prop::collection::vec(any::<prop::sample::Index>(), 0..6)).prop_map(
        |(dispatched, acknowledged)| PartitionStep {
            dispatched,
            acknowledged,
        },
    )
}

fn runs() -> impl Strategy<Value = Vec<Vec<PartitionStep>>> {
    prop::collection::vec(
        prop::collection::vec(partition_step(), PARTITIONS as usize),
        1..12,
    )
}

fn create_committer() -> (OffsetCommitter, Arc<OffsetQueue>, Arc<RecordingCommitter>) {
    let queue = Arc::new(OffsetQueue::new());
    let recording = Arc::new(RecordingCommitter::default());
    let committer = OffsetCommitter::new(
        &OffsetCommitterConfig::default(),
        queue.clone(),
        recording.clone(),
        OffsetCommitterMetrics::new().unwrap(),
    )
    .unwrap();
    (committer, queue, recording)
}

fn partition(id: u32) -> SubscriptionPartition {
    SubscriptionPartition::new(SubscriptionName::new("orders", "billing"), id)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_commit_never_passes_unacknowledged_message_and_never_regresses(runs in runs()) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let (committer, queue, recording) = create_committer();
            let mut dispatch: Vec<PartitionDispatch> =
                (0..PARTITIONS).map(|_| PartitionDispatch::default()).collect();
            let mut last_committed: HashMap<SubscriptionPartition, Offset> = HashMap::new();

            for run in runs {
                for (id, step) in run.iter().enumerate() {
                    let state = &mut dispatch[id];
                    let subscription_partition = partition(id as u32);

                    for _ in 0..step.dispatched {
                        let offset = state.next_offset;
                        state.next_offset += 1;
                        state.unacknowledged.insert(offset);
                        queue.offer_inflight_offset(SubscriptionPartitionOffset::new(
                            subscription_partition.clone(),
                            offset,
                        ));
                    }

                    for index in &step.acknowledged {
                        if state.unacknowledged.is_empty() {
                            break;
                        }
                        let candidates: Vec<Offset> =
                            state.unacknowledged.iter().copied().collect();
                        let offset = candidates[index.index(candidates.len())];
                        state.unacknowledged.remove(&offset);
                        queue.offer_committed_offset(SubscriptionPartitionOffset::new(
                            subscription_partition.clone(),
                            offset,
                        ));
                    }
                }

                committer.run_once().await.unwrap();
                let commit = recording.commits.lock().last().cloned().unwrap_or_default();

                for (partition, offset) in commit {
                    let bound = dispatch[partition.partition as usize].resume_bound();
                    prop_assert!(
                        offset <= bound,
                        "committed {} for {} past unacknowledged offset {}",
                        offset, partition, bound
                    );
                    if let Some(previous) = last_committed.insert(partition.clone(), offset) {
                        prop_assert!(
                            offset >= previous,
                            "commit for {} moved back from {} to {}", partition, previous, offset
                        );
                    }
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn test_single_run_commits_minimum_of_both_bounds(
        inflight in prop::collection::btree_set(0i64..50, 0..20),
        acknowledged in prop::collection::btree_set(0i64..50, 0..20),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let commit = rt.block_on(async {
            let (committer, queue, recording) = create_committer();
            for offset in &inflight {
                let event = SubscriptionPartitionOffset::new(partition(0), *offset);
                queue.offer_inflight_offset(event);
            }
            for offset in &acknowledged {
                let event = SubscriptionPartitionOffset::new(partition(0), *offset);
                queue.offer_committed_offset(event);
            }
            committer.run_once().await.unwrap();
            let last = recording.commits.lock().last().cloned().unwrap_or_default();
            last
        });

        let max_acknowledged = acknowledged.iter().next_back().map(|o| o + 1);
        let min_outstanding = inflight.difference(&acknowledged).next().copied();
        let expected = match (max_acknowledged, min_outstanding) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        prop_assert_eq!(commit.get(&partition(0)).copied(), expected);
    }
}
