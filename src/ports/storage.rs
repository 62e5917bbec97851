use crate::domain::ArtifactKey;
use async_trait::async_trait;
use bytes::Bytes;
use std::io;

/// Backing storage for raw and transformed segment bytes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// `Ok(None)` when the artifact does not exist.
    async fn read(&self, key: ArtifactKey) -> io::Result<Option<Bytes>>;

    async fn write(&self, key: ArtifactKey, bytes: &[u8]) -> io::Result<()>;

    /// Removing an artifact that is already gone is not an error.
    async fn remove(&self, key: ArtifactKey) -> io::Result<()>;

    /// Empties the store. Run once at startup.
    async fn purge(&self) -> io::Result<()>;
}
