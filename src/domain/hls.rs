use std::fmt::Write as _;
use std::path::Path;
use tokio::fs;

pub struct MediaSegment {
    pub duration: f64,
    pub uri: String,
}

/// Live (sliding window) media playlist. Never carries `#EXT-X-ENDLIST`.
pub struct LivePlaylist {
    pub version: u8,
    pub target_duration: u64,
    /// `None` renders the header-only, unplayable form.
    pub media_sequence: Option<u64>,
    pub segments: Vec<MediaSegment>,
}

impl LivePlaylist {
    pub fn new(target_duration: u64, media_sequence: u64) -> Self {
        Self {
            version: 3,
            target_duration,
            media_sequence: Some(media_sequence),
            segments: Vec::new(),
        }
    }

    /// Placeholder served while too few segments are ready.
    pub fn header_only(target_duration: u64) -> Self {
        Self {
            version: 3,
            target_duration,
            media_sequence: None,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, duration: f64, uri: String) {
        self.segments.push(MediaSegment { duration, uri });
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(96 + self.segments.len() * 64);
        out.push_str("#EXTM3U\n");
        let _ = writeln!(out, "#EXT-X-VERSION:{}", self.version);
        let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration);
        if let Some(sequence) = self.media_sequence {
            let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", sequence);
        }
        for segment in &self.segments {
            let _ = writeln!(out, "#EXTINF:{:.1},", segment.duration);
            out.push_str(&segment.uri);
            out.push('\n');
        }
        out
    }

    /// Writes through a sibling temp file and renames it into place so a
    /// reader never observes a half-written manifest.
    pub async fn write_to(&self, path: &Path) -> Result<(), std::io::Error> {
        write_rendered(path, &self.render()).await
    }
}

/// Replaces `path` with an already rendered manifest via a staging file.
pub async fn write_rendered(path: &Path, body: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let staging = path.with_extension("m3u8.part");
    fs::write(&staging, body).await?;
    fs::rename(&staging, path).await
}
