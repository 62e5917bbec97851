use crate::domain::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// GET against the upstream origin with its required request headers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamPort: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Bytes, FetchError>;
}
