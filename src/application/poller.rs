use crate::domain::window::RecentIdWindow;
use crate::domain::{PipelineError, SegmentId};
use crate::ports::upstream::UpstreamPort;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upstream URL layout. Both endpoints embed the current epoch second; the
/// origin rejects stale values, so URLs are built fresh per request.
#[derive(Debug, Clone)]
pub struct UpstreamEndpoints {
    pub manifest_base: String,
    pub media_base: String,
}

impl UpstreamEndpoints {
    pub fn new(manifest_base: impl Into<String>, media_base: impl Into<String>) -> Self {
        Self {
            manifest_base: manifest_base.into(),
            media_base: media_base.into(),
        }
    }

    pub fn manifest_url(&self, epoch: i64) -> String {
        format!("{}chunklist_w{}.m3u8", self.manifest_base, epoch)
    }

    pub fn segment_url(&self, epoch: i64, id: SegmentId) -> String {
        format!("{}media_w{}_{}.ts", self.media_base, epoch, id)
    }
}

pub fn epoch_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Highest segment id listed in an upstream media playlist.
pub fn newest_segment(manifest: &[u8]) -> Result<SegmentId, PipelineError> {
    let playlist = m3u8_rs::parse_media_playlist_res(manifest)
        .map_err(|e| PipelineError::Manifest(e.to_string()))?;

    let first_uri = match playlist.segments.first() {
        Some(segment) => segment.uri.clone(),
        None => return Err(PipelineError::EmptyManifest),
    };

    playlist
        .segments
        .iter()
        .filter_map(|segment| SegmentId::from_uri(&segment.uri).ok())
        .max()
        .ok_or(PipelineError::UnrecognisedSegmentUri(first_uri))
}

pub struct SourcePoller<U> {
    upstream: Arc<U>,
    endpoints: Arc<UpstreamEndpoints>,
    recent: RecentIdWindow,
    timeout: Duration,
}

impl<U: UpstreamPort> SourcePoller<U> {
    pub fn new(
        upstream: Arc<U>,
        endpoints: Arc<UpstreamEndpoints>,
        recent_capacity: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            endpoints,
            recent: RecentIdWindow::new(recent_capacity),
            timeout,
        }
    }

    /// The newest upstream id if it has not been reported recently. Network
    /// and parse failures count as "nothing new".
    pub async fn poll(&mut self) -> Option<SegmentId> {
        let id = match self.newest_listed().await {
            Ok(id) => id,
            Err(PipelineError::EmptyManifest) => {
                debug!("Upstream manifest lists no segments");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Manifest poll failed");
                return None;
            }
        };

        if self.recent.contains(id) {
            debug!(segment = %id, "Segment already seen");
            return None;
        }
        if let Some(evicted) = self.recent.insert(id) {
            debug!(segment = %evicted, "Dropped from recent window");
        }
        info!(segment = %id, "New segment found");
        Some(id)
    }

    pub fn recent(&self) -> &RecentIdWindow {
        &self.recent
    }

    async fn newest_listed(&self) -> Result<SegmentId, PipelineError> {
        let url = self.endpoints.manifest_url(epoch_seconds());
        let body = self.upstream.fetch(&url, self.timeout).await?;
        newest_segment(&body)
    }
}
