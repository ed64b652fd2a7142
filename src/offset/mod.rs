pub mod committer;
pub mod queue;
pub mod reducing;
pub mod to_commit;
pub mod traits;

pub use committer::OffsetCommitter;
pub use queue::OffsetQueue;
pub use reducing::ReducingConsumer;
pub use to_commit::OffsetsToCommit;
pub use traits::MessageCommitter;
