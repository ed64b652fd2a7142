//! Periodic offset commit for subscriptions.
//!
//! Dispatch workers report two kinds of offset events through the [`OffsetQueue`]:
//! inflight offsets (messages being sent) and committed offsets (messages
//! acknowledged by the subscriber). Once per period a single task drains both
//! queues and commits, for every subscription partition, the minimum of
//!
//! * the maximum committed offset plus one, and
//! * the minimum inflight offset that was not committed in the same run.
//!
//! A committed offset marks the first message read after a consumer restart,
//! hence the plus one. Inflight offsets that stay unacknowledged are carried over
//! to the next run and keep holding the commit position back until they are
//! acknowledged or their subscription is removed.

use std::any::Any;
use std::cmp;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::queue::ArrayQueue;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::OffsetCommitterConfig;
use crate::error::{Result, RustMqError};
use crate::metrics::OffsetCommitterMetrics;
use crate::offset::{MessageCommitter, OffsetQueue, OffsetsToCommit, ReducingConsumer};
use crate::types::{Offset, SubscriptionName, SubscriptionPartition, SubscriptionPartitionOffset};

pub struct OffsetCommitter {
    commit_period: Duration,
    subscriptions_to_cleanup: Arc<ArrayQueue<SubscriptionName>>,
    metrics: Arc<OffsetCommitterMetrics>,
    // Empty while a run or the schedule holds the worker.
    worker: Arc<Mutex<Option<CommitWorker>>>,
    schedule: Mutex<Option<CommitSchedule>>,
}

struct CommitSchedule {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Exclusive hold on the worker. Dropping the lease puts the worker back into
/// its slot, also when the holding future is cancelled or its task aborted.
struct WorkerLease {
    slot: Arc<Mutex<Option<CommitWorker>>>,
    worker: Option<CommitWorker>,
}

impl WorkerLease {
    fn acquire(slot: &Arc<Mutex<Option<CommitWorker>>>) -> Option<Self> {
        let worker = slot.lock().take()?;
        Some(Self {
            slot: slot.clone(),
            worker: Some(worker),
        })
    }

    async fn run(&mut self) {
        if let Some(worker) = self.worker.as_mut() {
            worker.run().await;
        }
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            *self.slot.lock() = Some(worker);
        }
    }
}

/// State owned by whoever executes a run. Never shared with dispatch workers.
struct CommitWorker {
    offset_queue: Arc<OffsetQueue>,
    message_committer: Arc<dyn MessageCommitter>,
    metrics: Arc<OffsetCommitterMetrics>,
    subscriptions_to_cleanup: Arc<ArrayQueue<SubscriptionName>>,
    inflight_offsets: HashSet<SubscriptionPartitionOffset>,
}

impl OffsetCommitter {
    pub fn new(
        config: &OffsetCommitterConfig,
        offset_queue: Arc<OffsetQueue>,
        message_committer: Arc<dyn MessageCommitter>,
        metrics: Arc<OffsetCommitterMetrics>,
    ) -> Result<Self> {
        config.validate()?;

        let subscriptions_to_cleanup = Arc::new(ArrayQueue::new(config.cleanup_queue_capacity));
        let worker = CommitWorker {
            offset_queue,
            message_committer,
            metrics: metrics.clone(),
            subscriptions_to_cleanup: subscriptions_to_cleanup.clone(),
            inflight_offsets: HashSet::new(),
        };

        Ok(Self {
            commit_period: config.commit_period(),
            subscriptions_to_cleanup,
            metrics,
            worker: Arc::new(Mutex::new(Some(worker))),
            schedule: Mutex::new(None),
        })
    }

    /// Start committing with a fixed delay between runs. The first run happens
    /// one commit period after start.
    pub fn start(&self) -> Result<()> {
        let mut schedule = self.schedule.lock();
        if schedule.is_some() {
            return Err(RustMqError::InvalidOperation(
                "offset committer already started".to_string(),
            ));
        }

        let mut lease = WorkerLease::acquire(&self.worker).ok_or_else(|| {
            RustMqError::InvalidOperation("offset committer run in progress".to_string())
        })?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let commit_period = self.commit_period;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(commit_period) => lease.run().await,
                }
            }
        });

        *schedule = Some(CommitSchedule {
            shutdown_tx,
            handle,
        });

        info!(
            "Started offset committer with commit period of {}s",
            commit_period.as_secs()
        );
        Ok(())
    }

    /// Stop the schedule. A run in progress completes first. Carried-over
    /// inflight offsets are kept. If this future is dropped early the task
    /// still stops after its current run and hands the worker back.
    pub async fn shutdown(&self) -> Result<()> {
        let schedule = self.schedule.lock().take();
        let Some(CommitSchedule {
            shutdown_tx,
            handle,
        }) = schedule
        else {
            return Ok(());
        };

        // The receiver is gone only if the task already ended.
        let _ = shutdown_tx.send(()).await;
        handle.await?;

        info!("Offset committer stopped");
        Ok(())
    }

    /// Execute a single run on the calling task. Rejected while the periodic
    /// schedule is active.
    pub async fn run_once(&self) -> Result<()> {
        let mut lease = WorkerLease::acquire(&self.worker).ok_or_else(|| {
            RustMqError::InvalidOperation("offset committer is running".to_string())
        })?;

        lease.run().await;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.schedule.lock().is_some()
    }

    /// Drop every carried-over inflight offset of the subscription at the end of
    /// the next successful run. Never blocks; when the cleanup queue is full the
    /// request is dropped and the offsets linger until a later request.
    pub fn remove_uncommitted_offsets(&self, subscription: SubscriptionName) {
        if let Err(subscription) = self.subscriptions_to_cleanup.push(subscription) {
            self.metrics.cleanup_dropped.inc();
            debug!(
                "Cleanup queue full, dropping uncommitted offsets removal for {}",
                subscription
            );
        }
    }
}

impl Drop for OffsetCommitter {
    fn drop(&mut self) {
        if let Some(schedule) = self.schedule.get_mut().take() {
            schedule.handle.abort();
        }
    }
}

impl CommitWorker {
    /// One run, with every failure contained here so the schedule keeps going.
    async fn run(&mut self) {
        let timer = self.metrics.tick_duration.start_timer();

        let result = match AssertUnwindSafe(self.commit()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(RustMqError::TickPanicked(panic_message(panic.as_ref()))),
        };

        timer.observe_duration();
        self.metrics
            .inflight_offsets
            .set(self.inflight_offsets.len() as i64);

        if let Err(e) = result {
            self.metrics.failures.inc();
            error!("Failed to run offset committer: {}", e);
        }
    }

    async fn commit(&mut self) -> Result<()> {
        // Committed offsets are drained before inflight ones. Every acknowledged
        // message was reported inflight earlier, so its inflight event is visible
        // to the later drain and cannot hold the partition back forever.
        let committed_reducer = self.process_committed_offsets();
        let (max_committed_offsets, committed_offsets) = committed_reducer.into_parts();

        let min_inflight_offsets = self.process_inflight_offsets(&committed_offsets);

        let (offsets_to_commit, scheduled_to_commit) =
            select_offsets_to_commit(&max_committed_offsets, &min_inflight_offsets);

        debug!(
            "Committing {} offsets, {} inflight offsets carried over",
            scheduled_to_commit,
            self.inflight_offsets.len()
        );

        self.message_committer
            .commit_offsets(offsets_to_commit)
            .await?;
        self.metrics.committed.inc_by(scheduled_to_commit);

        self.cleanup_unused_subscriptions();
        Ok(())
    }

    fn process_committed_offsets(&self) -> ReducingConsumer {
        let mut reducer = ReducingConsumer::with_modifier(cmp::max, next_offset);
        self.offset_queue
            .drain_committed_offsets(|offset| reducer.accept(offset));
        reducer.reset_modifier();
        reducer
    }

    fn process_inflight_offsets(
        &mut self,
        committed_offsets: &HashSet<SubscriptionPartitionOffset>,
    ) -> HashMap<SubscriptionPartition, Offset> {
        let mut reducer = ReducingConsumer::new(cmp::min);

        self.offset_queue.drain_inflight_offsets(|offset| {
            reduce_if_not_committed(offset, &mut reducer, committed_offsets)
        });
        for offset in std::mem::take(&mut self.inflight_offsets) {
            reduce_if_not_committed(offset, &mut reducer, committed_offsets);
        }

        let (min_inflight_offsets, inflight_offsets) = reducer.into_parts();
        self.inflight_offsets = inflight_offsets;
        min_inflight_offsets
    }

    fn cleanup_unused_subscriptions(&mut self) {
        let pending = self.subscriptions_to_cleanup.len();
        let subscriptions: HashSet<SubscriptionName> = (0..pending)
            .map_while(|_| self.subscriptions_to_cleanup.pop())
            .collect();
        if subscriptions.is_empty() {
            return;
        }

        let before = self.inflight_offsets.len();
        self.inflight_offsets
            .retain(|offset| !subscriptions.contains(offset.subscription_name()));
        debug!(
            "Removed {} uncommitted offsets of {} deleted subscriptions",
            before - self.inflight_offsets.len(),
            subscriptions.len()
        );
    }
}

fn next_offset(offset: Offset) -> Offset {
    offset.saturating_add(1)
}

fn reduce_if_not_committed(
    offset: SubscriptionPartitionOffset,
    reducer: &mut ReducingConsumer,
    committed_offsets: &HashSet<SubscriptionPartitionOffset>,
) {
    if !committed_offsets.contains(&offset) {
        reducer.accept(offset);
    }
}

fn select_offsets_to_commit(
    max_committed_offsets: &HashMap<SubscriptionPartition, Offset>,
    min_inflight_offsets: &HashMap<SubscriptionPartition, Offset>,
) -> (OffsetsToCommit, u64) {
    let partitions: HashSet<&SubscriptionPartition> = max_committed_offsets
        .keys()
        .chain(min_inflight_offsets.keys())
        .collect();

    let mut offsets_to_commit = OffsetsToCommit::new();
    let mut scheduled_to_commit = 0;
    for partition in partitions {
        let offset = cmp::min(
            min_inflight_offsets
                .get(partition)
                .copied()
                .unwrap_or(Offset::MAX),
            max_committed_offsets
                .get(partition)
                .copied()
                .unwrap_or(Offset::MAX),
        );
        if (0..Offset::MAX).contains(&offset) {
            scheduled_to_commit += 1;
            offsets_to_commit.add(SubscriptionPartitionOffset::new(partition.clone(), offset));
        }
    }

    (offsets_to_commit, scheduled_to_commit)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic message".to_string()
    }
}
