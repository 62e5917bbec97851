use super::errors::PipelineError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Upstream segment URIs end in `..._<id>.ts`.
static SEGMENT_URI_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d+)\.ts(?:\?.*)?$").expect("static regex"));

/// Numeric identifier taken from an upstream segment URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

impl SegmentId {
    pub fn from_uri(uri: &str) -> Result<Self, PipelineError> {
        SEGMENT_URI_ID
            .captures(uri)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .map(SegmentId)
            .ok_or_else(|| PipelineError::UnrecognisedSegmentUri(uri.to_string()))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SegmentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(SegmentId)
    }
}

impl From<u64> for SegmentId {
    fn from(value: u64) -> Self {
        SegmentId(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentState {
    Discovered,
    Downloading,
    Downloaded,
    Transforming,
    Ready,
    Failed,
    Evicted,
}

impl SegmentState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SegmentState::Ready | SegmentState::Failed | SegmentState::Evicted
        )
    }

    /// `Ready` is terminal for the pipeline but the cache may still evict it.
    pub fn can_become(self, next: SegmentState) -> bool {
        use SegmentState::*;
        matches!(
            (self, next),
            (Discovered, Downloading)
                | (Downloading, Downloaded)
                | (Downloading, Failed)
                | (Downloaded, Transforming)
                | (Transforming, Ready)
                | (Transforming, Failed)
                | (Ready, Evicted)
        )
    }
}

/// Which backing artifact of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Raw,
    Transformed,
}

/// Storage-agnostic reference to one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub kind: ArtifactKind,
    pub id: SegmentId,
}

impl ArtifactKey {
    pub fn raw(id: SegmentId) -> Self {
        Self {
            kind: ArtifactKind::Raw,
            id,
        }
    }

    pub fn transformed(id: SegmentId) -> Self {
        Self {
            kind: ArtifactKind::Transformed,
            id,
        }
    }
}

/// One unit of work. Owned by exactly one pipeline stage at a time, then by
/// the ready cache once it becomes `Ready`.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: SegmentId,
    state: SegmentState,
    pub raw: Option<ArtifactKey>,
    pub transformed: Option<ArtifactKey>,
    pub discovered_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
}

impl Segment {
    pub fn discovered(id: SegmentId) -> Self {
        Self {
            id,
            state: SegmentState::Discovered,
            raw: None,
            transformed: None,
            discovered_at: Utc::now(),
            ready_at: None,
        }
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn advance(&mut self, next: SegmentState) -> Result<(), PipelineError> {
        if !self.state.can_become(next) {
            return Err(PipelineError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        if next == SegmentState::Ready {
            self.ready_at = Some(Utc::now());
        }
        self.state = next;
        Ok(())
    }
}
