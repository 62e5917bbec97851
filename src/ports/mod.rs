//! Ports - Trait definitions for everything outside the pipeline core.

pub mod codec;
pub mod executor;
pub mod storage;
pub mod upstream;

pub use codec::SegmentCodec;
pub use executor::PipelineExecutor;
pub use storage::ArtifactStore;
pub use upstream::UpstreamPort;
