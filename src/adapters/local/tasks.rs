use crate::domain::{PipelineError, SegmentId};
use crate::ports::executor::PipelineExecutor;
use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// In-process backend: one tokio task per segment pipeline.
#[derive(Debug, Clone, Default)]
pub struct TaskExecutor {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl TaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineExecutor for TaskExecutor {
    fn submit(&self, id: SegmentId, work: BoxFuture<'static, ()>) -> Result<(), PipelineError> {
        if self.tracker.is_closed() {
            return Err(PipelineError::ExecutorClosed);
        }
        let token = self.token.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!(segment = %id, "Pipeline cancelled"),
                _ = work => {}
            }
        });
        Ok(())
    }

    fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    async fn shutdown(&self) {
        info!(in_flight = self.tracker.len(), "Cancelling segment pipelines");
        self.tracker.close();
        self.token.cancel();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_submitted_work_runs() {
        let executor = TaskExecutor::new();
        let (tx, rx) = tokio::sync::oneshot::channel();

        executor
            .submit(SegmentId(1), async move { tx.send(7).unwrap() }.boxed())
            .unwrap();

        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_work() {
        let executor = TaskExecutor::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        executor
            .submit(
                SegmentId(2),
                async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    flag.store(true, Ordering::SeqCst);
                }
                .boxed(),
            )
            .unwrap();
        assert_eq!(executor.in_flight(), 1);

        tokio::time::timeout(Duration::from_secs(5), executor.shutdown())
            .await
            .expect("shutdown should not wait for the sleeping task");

        assert!(!finished.load(Ordering::SeqCst));
        assert_eq!(executor.in_flight(), 0);
        assert!(matches!(
            executor.submit(SegmentId(3), async {}.boxed()),
            Err(PipelineError::ExecutorClosed)
        ));
    }
}
