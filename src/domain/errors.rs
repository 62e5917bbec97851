//! Error taxonomy for the segment pipeline.

use super::segment::{SegmentId, SegmentState};
use thiserror::Error;

/// Failure of a single upstream HTTP request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upstream answered {status} for {url}")]
    Status { status: u16, url: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unparsable upstream manifest: {0}")]
    Manifest(String),

    #[error("upstream manifest lists no segments")]
    EmptyManifest,

    #[error("no segment id in uri {0:?}")]
    UnrecognisedSegmentUri(String),

    #[error("segment {id} download failed after {attempts} attempts")]
    DownloadExhausted { id: SegmentId, attempts: u32 },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("segment {0} decoded to zero frames")]
    ZeroFrames(SegmentId),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("artifact storage: {0}")]
    Storage(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("pipeline executor is shut down")]
    ExecutorClosed,

    #[error("segment {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: SegmentId,
        from: SegmentState,
        to: SegmentState,
    },

    #[error("pipeline cancelled")]
    Cancelled,
}

impl From<ffmpeg_next::Error> for PipelineError {
    fn from(err: ffmpeg_next::Error) -> Self {
        PipelineError::Decode(err.to_string())
    }
}
