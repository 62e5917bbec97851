use crate::domain::hls::{self, LivePlaylist};
use crate::domain::SegmentId;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Prefix of every segment URL in the manifests, without trailing slash.
    pub public_base_url: String,
    pub max_entries: usize,
    pub min_ready: usize,
    pub target_duration: u64,
    /// When set, every published manifest is also written here.
    pub manifest_path: Option<PathBuf>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8000".to_string(),
            max_entries: 10,
            min_ready: 3,
            target_duration: 6,
            manifest_path: None,
        }
    }
}

/// One published window, rendered for both the transformed and raw streams.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPlaylist {
    pub media_sequence: SegmentId,
    pub ids: Vec<SegmentId>,
    pub body: String,
    pub raw_body: String,
}

/// Owns the currently published manifests. Readers always see either the
/// previous complete manifest or the new one.
pub struct PlaylistPublisher {
    config: PublisherConfig,
    current: watch::Sender<Option<Arc<PublishedPlaylist>>>,
}

impl PlaylistPublisher {
    pub fn new(mut config: PublisherConfig) -> Self {
        config.public_base_url = config.public_base_url.trim_end_matches('/').to_string();
        config.max_entries = config.max_entries.max(1);
        let (current, _) = watch::channel(None);
        Self { config, current }
    }

    fn playlist(&self, window: &[SegmentId], route: &str) -> LivePlaylist {
        let mut playlist = LivePlaylist::new(self.config.target_duration, window[0].value());
        let duration = self.config.target_duration as f64;
        for id in window {
            playlist.add_segment(
                duration,
                format!("{}/api/{}/{}.ts", self.config.public_base_url, route, id),
            );
        }
        playlist
    }

    /// Renders the oldest `max_entries` ids of `window` (ascending) without
    /// making them visible. `None` while fewer than `min_ready` ids exist.
    pub fn render(&self, window: &[SegmentId]) -> Option<Arc<PublishedPlaylist>> {
        if window.len() < self.config.min_ready || window.is_empty() {
            debug!(ready = window.len(), needed = self.config.min_ready, "Not enough segments to publish");
            return None;
        }

        let emitted = &window[..window.len().min(self.config.max_entries)];
        Some(Arc::new(PublishedPlaylist {
            media_sequence: emitted[0],
            ids: emitted.to_vec(),
            body: self.playlist(emitted, "segments").render(),
            raw_body: self.playlist(emitted, "raw-segments").render(),
        }))
    }

    /// Makes `published` the manifest served to readers and persists it.
    pub async fn commit(&self, published: Arc<PublishedPlaylist>) {
        if let Some(path) = &self.config.manifest_path {
            if let Err(e) = hls::write_rendered(path, &published.body).await {
                warn!(path = %path.display(), error = %e, "Failed to persist playlist");
            }
        }

        info!(
            media_sequence = %published.media_sequence,
            segments = published.ids.len(),
            "Playlist updated"
        );
        self.current.send_replace(Some(published));
    }

    /// `render` followed by `commit`.
    pub async fn publish(&self, window: &[SegmentId]) -> Option<Arc<PublishedPlaylist>> {
        let published = self.render(window)?;
        self.commit(published.clone()).await;
        Some(published)
    }

    pub fn min_ready(&self) -> usize {
        self.config.min_ready
    }

    pub fn current(&self) -> Option<Arc<PublishedPlaylist>> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PublishedPlaylist>>> {
        self.current.subscribe()
    }

    /// Transformed manifest, or the header-only placeholder.
    pub fn manifest(&self) -> String {
        match self.current() {
            Some(published) => published.body.clone(),
            None => LivePlaylist::header_only(self.config.target_duration).render(),
        }
    }

    pub fn raw_manifest(&self) -> String {
        match self.current() {
            Some(published) => published.raw_body.clone(),
            None => LivePlaylist::header_only(self.config.target_duration).render(),
        }
    }
}
