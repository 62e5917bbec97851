use crate::domain::{ArtifactKey, PipelineError, Segment, SegmentId, SegmentState};
use crate::ports::storage::ArtifactStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bounded set of `Ready` segments, ordered by id.
pub struct ReadyCache<S> {
    store: Arc<S>,
    capacity: usize,
    entries: BTreeMap<SegmentId, Segment>,
}

impl<S: ArtifactStore> ReadyCache<S> {
    pub fn new(store: Arc<S>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            entries: BTreeMap::new(),
        }
    }

    /// Persists the transformed bytes and marks the segment `Ready`. Inserting
    /// an id that is already present changes nothing and returns `false`.
    pub async fn insert(&mut self, mut segment: Segment, transformed: &[u8]) -> Result<bool, PipelineError> {
        if self.entries.contains_key(&segment.id) {
            debug!(segment = %segment.id, "Segment already cached");
            return Ok(false);
        }

        let key = ArtifactKey::transformed(segment.id);
        if let Err(e) = self.store.write(key, transformed).await {
            if let Err(cleanup) = self.store.remove(key).await {
                warn!(segment = %segment.id, error = %cleanup, "Failed to delete partial artifact");
            }
            return Err(e.into());
        }
        segment.transformed = Some(key);
        segment.advance(SegmentState::Ready)?;

        info!(segment = %segment.id, cached = self.entries.len() + 1, "Segment ready");
        self.entries.insert(segment.id, segment);
        Ok(true)
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every ready id, ascending.
    pub fn window(&self) -> Vec<SegmentId> {
        self.entries.keys().copied().collect()
    }

    /// The window, or `None` while fewer than `min_ready` segments would make
    /// an unplayable manifest.
    pub fn publishable_window(&self, min_ready: usize) -> Option<Vec<SegmentId>> {
        (self.entries.len() >= min_ready.max(1)).then(|| self.window())
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.entries.get(&id)
    }

    /// Drops the smallest ids until the cache is back at capacity and deletes
    /// their artifacts. Deletion failures are logged, not returned.
    pub async fn evict_excess(&mut self) -> Vec<SegmentId> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let Some((id, mut segment)) = self.entries.pop_first() else {
                break;
            };
            if let Err(e) = segment.advance(SegmentState::Evicted) {
                warn!(segment = %id, error = %e, "Unexpected state at eviction");
            }

            let keys = [Some(ArtifactKey::raw(id)), segment.transformed];
            for key in keys.into_iter().flatten() {
                if let Err(e) = self.store.remove(key).await {
                    warn!(segment = %id, kind = ?key.kind, error = %e, "Failed to delete artifact");
                }
            }
            debug!(segment = %id, "Evicted segment");
            evicted.push(id);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::fs::FsArtifactStore;
    use tempfile::tempdir;

    fn transforming(id: u64) -> Segment {
        let mut segment = Segment::discovered(SegmentId(id));
        for next in [
            SegmentState::Downloading,
            SegmentState::Downloaded,
            SegmentState::Transforming,
        ] {
            segment.advance(next).unwrap();
        }
        segment
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FsArtifactStore::new(dir.path()));
        let mut cache = ReadyCache::new(store.clone(), 10);

        assert!(cache.insert(transforming(5), b"first").await.unwrap());
        assert!(!cache.insert(transforming(5), b"second").await.unwrap());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(SegmentId(5)).unwrap().state(), SegmentState::Ready);
        let stored = store.read(ArtifactKey::transformed(SegmentId(5))).await.unwrap();
        assert_eq!(stored.as_deref(), Some(&b"first"[..]));
    }

    #[tokio::test]
    async fn test_out_of_order_completion_stays_sorted() {
        let dir = tempdir().unwrap();
        let mut cache = ReadyCache::new(Arc::new(FsArtifactStore::new(dir.path())), 10);

        for id in [12, 10] {
            cache.insert(transforming(id), b"ts").await.unwrap();
        }
        assert_eq!(cache.publishable_window(3), None);
        cache.insert(transforming(11), b"ts").await.unwrap();
        assert_eq!(cache.publishable_window(3).map(|w| w.len()), Some(3));

        assert_eq!(cache.window(), vec![SegmentId(10), SegmentId(11), SegmentId(12)]);
    }

    #[tokio::test]
    async fn test_eleventh_segment_evicts_smallest() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FsArtifactStore::new(dir.path()));
        let mut cache = ReadyCache::new(store.clone(), 10);

        for id in 100..=110 {
            store.write(ArtifactKey::raw(SegmentId(id)), b"raw").await.unwrap();
            cache.insert(transforming(id), b"ts").await.unwrap();
        }
        assert_eq!(cache.len(), 11);

        let evicted = cache.evict_excess().await;

        assert_eq!(evicted, vec![SegmentId(100)]);
        assert_eq!(cache.len(), 10);
        assert!(!cache.contains(SegmentId(100)));
        assert_eq!(cache.window().first(), Some(&SegmentId(101)));
        assert!(!store.path_of(ArtifactKey::raw(SegmentId(100))).exists());
        assert!(!store.path_of(ArtifactKey::transformed(SegmentId(100))).exists());
        assert!(store.path_of(ArtifactKey::transformed(SegmentId(101))).exists());
    }

    #[tokio::test]
    async fn test_eviction_tolerates_missing_raw() {
        let dir = tempdir().unwrap();
        let mut cache = ReadyCache::new(Arc::new(FsArtifactStore::new(dir.path())), 1);

        cache.insert(transforming(1), b"ts").await.unwrap();
        cache.insert(transforming(2), b"ts").await.unwrap();

        assert_eq!(cache.evict_excess().await, vec![SegmentId(1)]);
        assert!(cache.evict_excess().await.is_empty());
    }
}
