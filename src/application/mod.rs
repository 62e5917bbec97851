//! Application layer - Generic services that use ports.

pub mod cache;
pub mod downloader;
pub mod orchestrator;
pub mod poller;
pub mod publisher;
pub mod settings;
pub mod stats;
pub mod transform;
