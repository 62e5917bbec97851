use super::cache::ReadyCache;
use super::downloader::SegmentDownloader;
use super::poller::SourcePoller;
use super::publisher::{PlaylistPublisher, PublishedPlaylist};
use super::settings::SettingsHandle;
use super::stats::ProcessingStats;
use super::transform::TransformStage;
use crate::domain::effect::{FrameTransform, TonalEffect};
use crate::domain::scene::SceneParams;
use crate::domain::{ArtifactKey, PipelineError, Segment, SegmentId, SegmentState};
use crate::ports::codec::SegmentCodec;
use crate::ports::executor::PipelineExecutor;
use crate::ports::storage::ArtifactStore;
use crate::ports::upstream::UpstreamPort;
use chrono_tz::Tz;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct LoopTimings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Stages shared by every in-flight segment. Only the ready cache is
/// mutable, and only under its lock.
pub struct SegmentPipeline<U, S, C> {
    downloader: SegmentDownloader<U, S>,
    transform: TransformStage<C>,
    cache: Mutex<ReadyCache<S>>,
    publisher: Arc<PlaylistPublisher>,
    stats: Arc<ProcessingStats>,
}

impl<U, S, C> SegmentPipeline<U, S, C>
where
    U: UpstreamPort + 'static,
    S: ArtifactStore + 'static,
    C: SegmentCodec + 'static,
{
    pub fn new(
        downloader: SegmentDownloader<U, S>,
        transform: TransformStage<C>,
        cache: ReadyCache<S>,
        publisher: Arc<PlaylistPublisher>,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        Self {
            downloader,
            transform,
            cache: Mutex::new(cache),
            publisher,
            stats,
        }
    }

    pub async fn ready_window(&self) -> Vec<SegmentId> {
        self.cache.lock().await.window()
    }

    /// Runs one segment to completion. Failures end here.
    pub async fn run(&self, id: SegmentId, scene: SceneParams, effect: Arc<dyn FrameTransform>) {
        let started = Instant::now();
        match self.process(id, scene, effect).await {
            Ok(()) => info!(
                segment = %id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Segment pipeline complete"
            ),
            Err(e) => {
                self.stats.record_failed();
                warn!(segment = %id, error = %e, "Segment dropped");
            }
        }
    }

    async fn process(
        &self,
        id: SegmentId,
        scene: SceneParams,
        effect: Arc<dyn FrameTransform>,
    ) -> Result<(), PipelineError> {
        let mut segment = Segment::discovered(id);
        segment.advance(SegmentState::Downloading)?;

        let started = Instant::now();
        let raw = match self.downloader.download(id).await {
            Ok(raw) => raw,
            Err(e) => return Err(fail(segment, e)),
        };
        self.stats.record_download(started.elapsed());
        segment.raw = Some(ArtifactKey::raw(id));
        segment.advance(SegmentState::Downloaded)?;

        segment.advance(SegmentState::Transforming)?;
        let started = Instant::now();
        let transformed = match self.transform.transform(id, raw, scene, effect).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.downloader.discard(id).await;
                return Err(fail(segment, e));
            }
        };
        self.stats.record_transform(started.elapsed());

        let mut cache = self.cache.lock().await;
        let inserted = match cache.insert(segment, &transformed).await {
            Ok(inserted) => inserted,
            Err(e) => {
                drop(cache);
                self.downloader.discard(id).await;
                return Err(e);
            }
        };
        if !inserted {
            return Ok(());
        }
        self.stats.record_ready();

        // Only the post-eviction manifest is committed to readers.
        let mut staged = self.render(&cache);
        let evicted = cache.evict_excess().await;
        if !evicted.is_empty() {
            debug!(evicted = ?evicted, "Re-rendering after eviction");
            staged = self.render(&cache);
        }
        if let Some(published) = staged {
            self.publisher.commit(published).await;
        }
        self.stats.record_window(&cache.window());
        Ok(())
    }

    fn render(&self, cache: &ReadyCache<S>) -> Option<Arc<PublishedPlaylist>> {
        cache
            .publishable_window(self.publisher.min_ready())
            .and_then(|window| self.publisher.render(&window))
    }
}

fn fail(mut segment: Segment, error: PipelineError) -> PipelineError {
    if let Err(e) = segment.advance(SegmentState::Failed) {
        debug!(segment = %segment.id, error = %e, "Could not mark segment failed");
    }
    error
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// The control loop: poll, hand each new id to its own pipeline, sleep.
pub struct Orchestrator<U, S, C, E> {
    poller: SourcePoller<U>,
    pipeline: Arc<SegmentPipeline<U, S, C>>,
    executor: Arc<E>,
    settings: SettingsHandle,
    timings: LoopTimings,
    scene_zone: Tz,
}

impl<U, S, C, E> Orchestrator<U, S, C, E>
where
    U: UpstreamPort + 'static,
    S: ArtifactStore + 'static,
    C: SegmentCodec + 'static,
    E: PipelineExecutor,
{
    pub fn new(
        poller: SourcePoller<U>,
        pipeline: Arc<SegmentPipeline<U, S, C>>,
        executor: Arc<E>,
        settings: SettingsHandle,
        timings: LoopTimings,
        scene_zone: Tz,
    ) -> Self {
        Self {
            poller,
            pipeline,
            executor,
            settings,
            timings,
            scene_zone,
        }
    }

    pub fn pipeline(&self) -> Arc<SegmentPipeline<U, S, C>> {
        self.pipeline.clone()
    }

    /// Runs until `shutdown` fires, then cancels in-flight pipelines.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            poll_interval_ms = self.timings.poll_interval.as_millis() as u64,
            "Processor started"
        );

        loop {
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                outcome = AssertUnwindSafe(self.tick()).catch_unwind() => outcome,
            };

            let pause = match outcome {
                Ok(Ok(())) => self.timings.poll_interval,
                Ok(Err(e)) => {
                    error!(error = %e, "Processor loop error");
                    self.timings.error_backoff
                }
                Err(panic) => {
                    error!(panic = panic_message(panic.as_ref()), "Processor loop panicked");
                    self.timings.error_backoff
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        self.executor.shutdown().await;
        info!("Processor stopped");
    }

    async fn tick(&mut self) -> Result<(), PipelineError> {
        match self.poller.poll().await {
            Some(id) => self.dispatch(id),
            None => Ok(()),
        }
    }

    /// Effect settings and scene are fixed here, at discovery time.
    fn dispatch(&self, id: SegmentId) -> Result<(), PipelineError> {
        self.pipeline.stats.record_discovered(id);

        let settings = self.settings.current();
        debug!(segment = %id, effect_version = settings.version, "Dispatching segment");
        let effect: Arc<dyn FrameTransform> = Arc::new(TonalEffect::new(settings));
        let scene = SceneParams::now(self.scene_zone);

        let pipeline = self.pipeline.clone();
        self.executor.submit(
            id,
            async move { pipeline.run(id, scene, effect).await }.boxed(),
        )
    }
}
