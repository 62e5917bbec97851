//! Livemorph - Live HLS restyling relay
//!
//! Polls a third-party live HLS stream, restyles every frame of each new
//! segment and republishes the result as a sliding-window live stream.
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (segments, windows, playlists, effect)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (reqwest, filesystem, ffmpeg, tokio, axum)
//! - application/: Generic services (poller, downloader, transform, cache, publisher)
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use config::LiveConfig;
pub use domain::hls;
