//! Adapters running inside this process: disk, codec, tasks and HTTP.

pub mod ffmpeg;
pub mod fs;
pub mod http;
pub mod tasks;

pub use ffmpeg::FfmpegCodec;
pub use fs::FsArtifactStore;
pub use tasks::TaskExecutor;
