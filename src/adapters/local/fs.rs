use crate::domain::{ArtifactKey, ArtifactKind};
use crate::ports::storage::ArtifactStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

const RAW_DIR: &str = "raw";
const PROCESSED_DIR: &str = "processed";

/// Artifacts as `<root>/raw/<id>.ts` and `<root>/processed/<id>.ts`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: ArtifactKey) -> PathBuf {
        let dir = match key.kind {
            ArtifactKind::Raw => RAW_DIR,
            ArtifactKind::Transformed => PROCESSED_DIR,
        };
        self.root.join(dir).join(format!("{}.ts", key.id))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn read(&self, key: ArtifactKey) -> io::Result<Option<Bytes>> {
        match tokio::fs::read(self.path_of(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, key: ArtifactKey, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Readers only ever see a complete file.
        let staging = path.with_extension("ts.part");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await
    }

    async fn remove(&self, key: ArtifactKey) -> io::Result<()> {
        match tokio::fs::remove_file(self.path_of(key)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    async fn purge(&self) -> io::Result<()> {
        for dir in [RAW_DIR, PROCESSED_DIR] {
            let dir = self.root.join(dir);
            tokio::fs::create_dir_all(&dir).await?;
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let removed = if entry.file_type().await?.is_dir() {
                    tokio::fs::remove_dir_all(&path).await
                } else {
                    tokio::fs::remove_file(&path).await
                };
                if let Err(e) = removed {
                    warn!(path = %path.display(), error = %e, "Failed to delete stale artifact");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SegmentId;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let key = ArtifactKey::raw(SegmentId(12));

        assert_eq!(store.read(key).await.unwrap(), None);
        store.write(key, b"ts-bytes").await.unwrap();

        assert_eq!(store.read(key).await.unwrap().unwrap(), Bytes::from_static(b"ts-bytes"));
        assert_eq!(store.path_of(key), dir.path().join("raw").join("12.ts"));
        assert!(!store.path_of(key).with_extension("ts.part").exists());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let key = ArtifactKey::transformed(SegmentId(3));

        store.remove(key).await.unwrap();
        store.write(key, b"x").await.unwrap();
        store.remove(key).await.unwrap();
        assert_eq!(store.read(key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_clears_previous_run() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.write(ArtifactKey::raw(SegmentId(1)), b"a").await.unwrap();
        store.write(ArtifactKey::transformed(SegmentId(1)), b"b").await.unwrap();
        tokio::fs::create_dir_all(dir.path().join("raw").join("leftover"))
            .await
            .unwrap();

        store.purge().await.unwrap();

        assert_eq!(store.read(ArtifactKey::raw(SegmentId(1))).await.unwrap(), None);
        assert_eq!(store.read(ArtifactKey::transformed(SegmentId(1))).await.unwrap(), None);
        assert!(!dir.path().join("raw").join("leftover").exists());
        assert!(dir.path().join("processed").is_dir());
    }
}
