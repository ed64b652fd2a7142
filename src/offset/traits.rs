use crate::{offset::OffsetsToCommit, Result};
use async_trait::async_trait;

/// Persists resume positions to the partition log store.
#[async_trait]
pub trait MessageCommitter: Send + Sync {
    /// Commit every offset in the batch. The call succeeds or fails as a whole;
    /// a committed offset is the first position read after a consumer restart.
    async fn commit_offsets(&self, offsets: OffsetsToCommit) -> Result<()>;
}
