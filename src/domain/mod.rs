//! Domain layer - Pure business logic.

pub mod effect;
pub mod errors;
pub mod hls;
pub mod scene;
pub mod segment;
pub mod window;

pub use errors::{FetchError, PipelineError};
pub use segment::{ArtifactKey, ArtifactKind, Segment, SegmentId, SegmentState};
