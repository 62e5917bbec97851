use crate::domain::{PipelineError, SegmentId};
use async_trait::async_trait;
use futures::future::BoxFuture;

/// Runs per-segment pipelines independently of the discovery loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    /// Starts `work` without waiting for it.
    fn submit(&self, id: SegmentId, work: BoxFuture<'static, ()>) -> Result<(), PipelineError>;

    /// Number of submitted pipelines still running.
    fn in_flight(&self) -> usize;

    /// Cancels outstanding work and waits for it to unwind.
    async fn shutdown(&self);
}
