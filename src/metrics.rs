use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use crate::Result;

pub struct OffsetCommitterMetrics {
    pub tick_duration: Histogram,
    pub committed: IntCounter,
    pub failures: IntCounter,
    pub inflight_offsets: IntGauge,
    pub cleanup_dropped: IntCounter,
    pub registry: Registry,
}

impl OffsetCommitterMetrics {
    pub fn new() -> Result<Arc<Self>> {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Result<Arc<Self>> {
        let tick_duration = Histogram::with_opts(HistogramOpts::new(
            "offset_committer_duration_seconds",
            "Duration of a single offset committer run",
        ))?;

        let committed = IntCounter::new(
            "offset_committer_committed_total",
            "Total number of partition offsets scheduled to commit",
        )?;

        let failures = IntCounter::new(
            "offset_committer_failures_total",
            "Total number of offset committer runs abandoned due to an error",
        )?;

        let inflight_offsets = IntGauge::new(
            "offset_committer_inflight_offsets",
            "Number of inflight offsets carried over between runs",
        )?;

        let cleanup_dropped = IntCounter::new(
            "offset_committer_cleanup_dropped_total",
            "Subscription cleanup requests dropped because the cleanup queue was full",
        )?;

        registry.register(Box::new(tick_duration.clone()))?;
        registry.register(Box::new(committed.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(inflight_offsets.clone()))?;
        registry.register(Box::new(cleanup_dropped.clone()))?;

        Ok(Arc::new(Self {
            tick_duration,
            committed,
            failures,
            inflight_offsets,
            cleanup_dropped,
            registry,
        }))
    }

    /// Prometheus text exposition of every metric in the registry.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        exposition_text(buffer)
    }
}

fn exposition_text(buffer: Vec<u8>) -> Result<String> {
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("metrics exposition is not UTF-8: {}", e)))
        .map_err(Into::into)
}
