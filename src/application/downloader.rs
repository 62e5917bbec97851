use super::poller::{epoch_seconds, UpstreamEndpoints};
use crate::domain::{ArtifactKey, PipelineError, SegmentId};
use crate::ports::storage::ArtifactStore;
use crate::ports::upstream::UpstreamPort;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
    /// Bound on each individual attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

pub struct SegmentDownloader<U, S> {
    upstream: Arc<U>,
    store: Arc<S>,
    endpoints: Arc<UpstreamEndpoints>,
    policy: RetryPolicy,
}

impl<U, S> SegmentDownloader<U, S>
where
    U: UpstreamPort,
    S: ArtifactStore,
{
    pub fn new(
        upstream: Arc<U>,
        store: Arc<S>,
        endpoints: Arc<UpstreamEndpoints>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            upstream,
            store,
            endpoints,
            policy,
        }
    }

    /// Raw bytes of `id`, fetched at most once. Exhausting the retry budget
    /// is terminal; the live edge will have moved past this segment.
    pub async fn download(&self, id: SegmentId) -> Result<Bytes, PipelineError> {
        let key = ArtifactKey::raw(id);
        if let Some(existing) = self.store.read(key).await? {
            debug!(segment = %id, "Segment already downloaded");
            return Ok(existing);
        }

        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            // A fresh timestamp per attempt; the origin rejects stale ones.
            let url = self.endpoints.segment_url(epoch_seconds(), id);
            match self.upstream.fetch(&url, self.policy.attempt_timeout).await {
                Ok(bytes) => {
                    self.store.write(key, &bytes).await?;
                    info!(
                        segment = %id,
                        attempt,
                        size_kb = bytes.len() / 1024,
                        "Downloaded segment"
                    );
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(segment = %id, attempt, max = attempts, error = %e, "Download attempt failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        Err(PipelineError::DownloadExhausted { id, attempts })
    }

    /// Deletes the raw bytes of a segment that will never become ready.
    pub async fn discard(&self, id: SegmentId) {
        if let Err(e) = self.store.remove(ArtifactKey::raw(id)).await {
            warn!(segment = %id, error = %e, "Failed to delete raw artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::fs::FsArtifactStore;
    use crate::domain::FetchError;
    use crate::ports::upstream::MockUpstreamPort;
    use tempfile::{tempdir, TempDir};

    fn downloader(
        upstream: MockUpstreamPort,
        attempts: u32,
    ) -> (SegmentDownloader<MockUpstreamPort, FsArtifactStore>, Arc<FsArtifactStore>, TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(FsArtifactStore::new(dir.path()));
        let downloader = SegmentDownloader::new(
            Arc::new(upstream),
            store.clone(),
            Arc::new(UpstreamEndpoints::new("https://up/", "https://media/")),
            RetryPolicy {
                attempts,
                delay: Duration::from_millis(1),
                attempt_timeout: Duration::from_secs(30),
            },
        );
        (downloader, store, dir)
    }

    fn unavailable(url: &str) -> FetchError {
        FetchError::Status {
            status: 404,
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_persistent_failure_uses_every_attempt() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_fetch()
            .withf(|url, _| url.starts_with("https://media/media_w") && url.ends_with("_200.ts"))
            .times(3)
            .returning(|url, _| Err(unavailable(url)));

        let (downloader, store, _dir) = downloader(upstream, 3);
        let err = downloader.download(SegmentId(200)).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::DownloadExhausted {
                id: SegmentId(200),
                attempts: 3
            }
        ));
        assert_eq!(store.read(ArtifactKey::raw(SegmentId(200))).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_success_on_last_attempt() {
        let mut upstream = MockUpstreamPort::new();
        let mut seq = mockall::Sequence::new();
        upstream
            .expect_fetch()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|url, _| Err(unavailable(url)));
        upstream
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Bytes::from_static(b"segment")));

        let (downloader, store, _dir) = downloader(upstream, 3);
        let bytes = downloader.download(SegmentId(9)).await.unwrap();

        assert_eq!(bytes, Bytes::from_static(b"segment"));
        assert_eq!(
            store.read(ArtifactKey::raw(SegmentId(9))).await.unwrap(),
            Some(Bytes::from_static(b"segment"))
        );
    }

    #[tokio::test]
    async fn test_stops_retrying_after_success() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(b"first-try")));

        let (downloader, _store, _dir) = downloader(upstream, 3);
        assert_eq!(
            downloader.download(SegmentId(10)).await.unwrap(),
            Bytes::from_static(b"first-try")
        );
    }

    #[tokio::test]
    async fn test_existing_bytes_skip_the_network() {
        let mut upstream = MockUpstreamPort::new();
        upstream.expect_fetch().times(0);

        let (downloader, store, _dir) = downloader(upstream, 3);
        store
            .write(ArtifactKey::raw(SegmentId(11)), b"cached")
            .await
            .unwrap();

        assert_eq!(
            downloader.download(SegmentId(11)).await.unwrap(),
            Bytes::from_static(b"cached")
        );
    }

    #[tokio::test]
    async fn test_discard_removes_raw_bytes() {
        let mut upstream = MockUpstreamPort::new();
        upstream
            .expect_fetch()
            .returning(|_, _| Ok(Bytes::from_static(b"segment")));

        let (downloader, store, _dir) = downloader(upstream, 3);
        downloader.download(SegmentId(12)).await.unwrap();
        downloader.discard(SegmentId(12)).await;
        downloader.discard(SegmentId(12)).await;

        assert_eq!(store.read(ArtifactKey::raw(SegmentId(12))).await.unwrap(), None);
    }
}
