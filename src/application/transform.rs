use crate::domain::effect::{Frame, FrameTransform};
use crate::domain::scene::SceneParams;
use crate::domain::{PipelineError, SegmentId};
use crate::ports::codec::SegmentCodec;
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Upper bound on frame workers regardless of core count.
pub const MAX_FRAME_WORKERS: usize = 8;

/// Segments holding decoded frames at the same time.
pub const DEFAULT_SEGMENT_LIMIT: usize = 2;

pub fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, MAX_FRAME_WORKERS)
}

/// Decode, per-frame transform on a bounded blocking pool, re-encode.
pub struct TransformStage<C> {
    codec: Arc<C>,
    workers: Arc<Semaphore>,
    segments: Semaphore,
    frame_rate: u32,
}

impl<C> TransformStage<C>
where
    C: SegmentCodec + 'static,
{
    pub fn new(codec: Arc<C>, workers: usize, frame_rate: u32) -> Self {
        Self {
            codec,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            segments: Semaphore::new(DEFAULT_SEGMENT_LIMIT),
            frame_rate,
        }
    }

    /// Caps how many segments may be between decode and encode at once,
    /// which bounds the decoded frames held in memory.
    pub fn with_segment_limit(mut self, limit: usize) -> Self {
        self.segments = Semaphore::new(limit.max(1));
        self
    }

    /// The worker pool is shared by every segment in flight.
    pub async fn transform(
        &self,
        id: SegmentId,
        raw: Bytes,
        scene: SceneParams,
        effect: Arc<dyn FrameTransform>,
    ) -> Result<Bytes, PipelineError> {
        let _admitted = self
            .segments
            .acquire()
            .await
            .map_err(|_| PipelineError::ExecutorClosed)?;
        debug!(segment = %id, "Admitted to transform");

        let codec = self.codec.clone();
        let frames = tokio::task::spawn_blocking(move || codec.decode(&raw)).await??;
        if frames.is_empty() {
            return Err(PipelineError::ZeroFrames(id));
        }
        debug!(segment = %id, frames = frames.len(), "Decoded segment");

        let total = frames.len();
        let transformed = self.transform_frames(frames, scene, effect).await?;
        debug_assert_eq!(transformed.len(), total);

        let codec = self.codec.clone();
        let frame_rate = self.frame_rate;
        let encoded =
            tokio::task::spawn_blocking(move || codec.encode(&transformed, frame_rate)).await??;

        info!(segment = %id, frames = total, size_kb = encoded.len() / 1024, "Transformed segment");
        Ok(Bytes::from(encoded))
    }

    async fn transform_frames(
        &self,
        frames: Vec<Frame>,
        scene: SceneParams,
        effect: Arc<dyn FrameTransform>,
    ) -> Result<Vec<Frame>, PipelineError> {
        let total = frames.len();
        let stride = effect.frame_stride().max(1);
        let bases = total.div_ceil(stride);

        let mut pending = FuturesUnordered::new();
        for (index, frame) in frames.into_iter().enumerate().step_by(stride) {
            let permit = self
                .workers
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::ExecutorClosed)?;
            let effect = effect.clone();
            pending.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                (index, effect.transform_frame(&frame, index, &scene))
            }));
        }

        let mut results: Vec<Option<Frame>> = vec![None; bases];
        while let Some(joined) = pending.next().await {
            let (index, frame) = joined?;
            results[index / stride] = Some(frame);
        }

        let mut out = Vec::with_capacity(total);
        for (slot, frame) in results.into_iter().enumerate() {
            let frame = frame.ok_or_else(|| {
                PipelineError::Encode(format!("missing transformed frame {}", slot * stride))
            })?;
            let run = stride.min(total - slot * stride);
            for _ in 1..run {
                out.push(frame.clone());
            }
            out.push(frame);
        }
        Ok(out)
    }
}
