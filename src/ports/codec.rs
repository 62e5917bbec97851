use crate::domain::effect::Frame;
use crate::domain::PipelineError;

/// Blocking codec boundary; always called from a blocking worker thread.
#[cfg_attr(test, mockall::automock)]
pub trait SegmentCodec: Send + Sync {
    /// Frames in presentation order.
    fn decode(&self, raw: &[u8]) -> Result<Vec<Frame>, PipelineError>;

    /// One encoded transport-stream segment at `frame_rate`.
    fn encode(&self, frames: &[Frame], frame_rate: u32) -> Result<Vec<u8>, PipelineError>;
}
