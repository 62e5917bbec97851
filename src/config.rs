//! Process configuration from the environment.

use crate::application::transform::{default_worker_count, DEFAULT_SEGMENT_LIMIT};
use chrono_tz::Tz;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_SOURCE_BASE_URL: &str = "https://videos-3.earthcam.com/fecnetwork/AbbeyRoadHD1.flv/";

#[derive(Clone, Debug)]
pub struct LiveConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Root of the raw and processed segment directories
    pub data_dir: PathBuf,
    /// Upstream manifest base URL, ending in `/`
    pub source_base_url: String,
    /// Upstream segment base URL, ending in `/`
    pub source_media_base_url: String,
    /// Prefix of segment URLs written into published manifests
    pub public_base_url: String,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub manifest_timeout: Duration,
    pub segment_timeout: Duration,
    pub download_attempts: u32,
    pub retry_delay: Duration,
    pub recent_window: usize,
    pub ready_capacity: usize,
    pub playlist_entries: usize,
    pub min_ready_segments: usize,
    pub target_duration: u64,
    pub frame_rate: u32,
    pub transform_workers: usize,
    /// Segments allowed between decode and encode at once
    pub transform_segments: usize,
    pub scene_timezone: Tz,
    /// Optional JSON file with effect settings, re-read on SIGHUP
    pub effect_config: Option<PathBuf>,
    pub encoder_crf: u8,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            addr: String::from("127.0.0.1"),
            port: String::from("8000"),
            data_dir: PathBuf::from("./data"),
            source_base_url: String::from(DEFAULT_SOURCE_BASE_URL),
            source_media_base_url: String::from(DEFAULT_SOURCE_BASE_URL),
            public_base_url: String::from("http://localhost:8000"),
            poll_interval: Duration::from_millis(2000),
            error_backoff: Duration::from_millis(5000),
            manifest_timeout: Duration::from_millis(10_000),
            segment_timeout: Duration::from_millis(30_000),
            download_attempts: 3,
            retry_delay: Duration::from_millis(200),
            recent_window: 10,
            ready_capacity: 10,
            playlist_entries: 10,
            min_ready_segments: 3,
            target_duration: 6,
            frame_rate: 30,
            transform_workers: default_worker_count(),
            transform_segments: DEFAULT_SEGMENT_LIMIT,
            scene_timezone: chrono_tz::Europe::London,
            effect_config: None,
            encoder_crf: 25,
        }
    }
}

/// Parsed value of `key`, or `default` when unset or unparsable.
fn parsed<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                warn!(key, value = %raw, error = %e, "Ignoring invalid setting");
                default
            }
        },
        Err(_) => default,
    }
}

fn millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(parsed(key, default.as_millis() as u64))
}

fn text(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

impl LiveConfig {
    /// Load configuration from `.env` and environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let d = Self::default();

        let source_base_url = text("SOURCE_BASE_URL", d.source_base_url);
        let source_media_base_url = text("SOURCE_MEDIA_BASE_URL", source_base_url.clone());

        Self {
            addr: text("ADDR", d.addr),
            port: text("PORT", d.port),
            data_dir: env::var("DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            source_base_url,
            source_media_base_url,
            public_base_url: text("PUBLIC_BASE_URL", d.public_base_url),
            poll_interval: millis("POLL_INTERVAL_MS", d.poll_interval),
            error_backoff: millis("ERROR_BACKOFF_MS", d.error_backoff),
            manifest_timeout: millis("MANIFEST_TIMEOUT_MS", d.manifest_timeout),
            segment_timeout: millis("SEGMENT_TIMEOUT_MS", d.segment_timeout),
            download_attempts: parsed("DOWNLOAD_ATTEMPTS", d.download_attempts).max(1),
            retry_delay: millis("RETRY_DELAY_MS", d.retry_delay),
            recent_window: parsed("RECENT_WINDOW", d.recent_window).max(1),
            ready_capacity: parsed("READY_CAPACITY", d.ready_capacity).max(1),
            playlist_entries: parsed("PLAYLIST_ENTRIES", d.playlist_entries).max(1),
            min_ready_segments: parsed("MIN_READY_SEGMENTS", d.min_ready_segments).max(1),
            target_duration: parsed("TARGET_DURATION", d.target_duration),
            frame_rate: parsed("FRAME_RATE", d.frame_rate),
            transform_workers: parsed("TRANSFORM_WORKERS", d.transform_workers)
                .clamp(1, crate::application::transform::MAX_FRAME_WORKERS),
            transform_segments: parsed("TRANSFORM_SEGMENTS", d.transform_segments).max(1),
            scene_timezone: parsed("SCENE_TIMEZONE", d.scene_timezone),
            effect_config: env::var("EFFECT_CONFIG").ok().map(PathBuf::from),
            encoder_crf: parsed("ENCODER_CRF", d.encoder_crf),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("current_playlist.m3u8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LiveConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.download_attempts, 3);
        assert_eq!(config.ready_capacity, 10);
        assert_eq!(config.min_ready_segments, 3);
        assert!((1..=8).contains(&config.transform_workers));
        assert_eq!(config.transform_segments, 2);
        assert_eq!(config.source_media_base_url, config.source_base_url);
        assert_eq!(config.manifest_path(), PathBuf::from("./data/current_playlist.m3u8"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        // Keys unique to this test; no other test reads them.
        env::set_var("LIVEMORPH_TEST_NUMBER", "twelve");
        env::set_var("LIVEMORPH_TEST_ZONE", "Europe/Paris");

        assert_eq!(parsed("LIVEMORPH_TEST_NUMBER", 7_u32), 7);
        assert_eq!(parsed("LIVEMORPH_TEST_UNSET", 9_u32), 9);
        assert_eq!(
            parsed("LIVEMORPH_TEST_ZONE", chrono_tz::Europe::London),
            chrono_tz::Europe::Paris
        );
    }
}
