//! Livemorph binary.
//!
//! Wires up:
//! - Upstream client, filesystem artifact store and ffmpeg codec
//! - The processor loop and its per-segment pipelines
//! - The HTTP surface serving the republished stream

use livemorph::adapters::local::http::{self, AppState};
use livemorph::adapters::local::{FfmpegCodec, FsArtifactStore, TaskExecutor};
use livemorph::adapters::remote::{BrowserHeaders, HttpUpstream};
use livemorph::application::cache::ReadyCache;
use livemorph::application::downloader::{RetryPolicy, SegmentDownloader};
use livemorph::application::orchestrator::{LoopTimings, Orchestrator, SegmentPipeline};
use livemorph::application::poller::{SourcePoller, UpstreamEndpoints};
use livemorph::application::publisher::{PlaylistPublisher, PublisherConfig};
use livemorph::application::settings::{self, SettingsHandle};
use livemorph::application::stats::ProcessingStats;
use livemorph::application::transform::TransformStage;
use livemorph::domain::effect::EffectSettings;
use livemorph::ports::ArtifactStore;
use livemorph::LiveConfig;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    let config = LiveConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run(config).await {
        error!(error = %e, "Fatal startup error");
        std::process::exit(1);
    }
}

async fn run(config: LiveConfig) -> Result<(), BoxError> {
    // 1. Adapters
    let store = Arc::new(FsArtifactStore::new(&config.data_dir));
    if let Err(e) = store.purge().await {
        warn!(dir = %config.data_dir.display(), error = %e, "Startup cleanup incomplete");
    }
    let upstream = Arc::new(HttpUpstream::new(&BrowserHeaders::default())?);
    let codec = Arc::new(FfmpegCodec::new(config.encoder_crf));
    let executor = Arc::new(TaskExecutor::new());
    let endpoints = Arc::new(UpstreamEndpoints::new(
        config.source_base_url.clone(),
        config.source_media_base_url.clone(),
    ));

    let settings = SettingsHandle::new(initial_settings(&config).await);
    let stats = Arc::new(ProcessingStats::new());
    let publisher = Arc::new(PlaylistPublisher::new(PublisherConfig {
        public_base_url: config.public_base_url.clone(),
        max_entries: config.playlist_entries,
        min_ready: config.min_ready_segments,
        target_duration: config.target_duration,
        manifest_path: Some(config.manifest_path()),
    }));

    // 2. Application services
    let pipeline = Arc::new(SegmentPipeline::new(
        SegmentDownloader::new(
            upstream.clone(),
            store.clone(),
            endpoints.clone(),
            RetryPolicy {
                attempts: config.download_attempts,
                delay: config.retry_delay,
                attempt_timeout: config.segment_timeout,
            },
        ),
        TransformStage::new(codec, config.transform_workers, config.frame_rate)
            .with_segment_limit(config.transform_segments),
        ReadyCache::new(store.clone(), config.ready_capacity),
        publisher.clone(),
        stats.clone(),
    ));
    let orchestrator = Orchestrator::new(
        SourcePoller::new(upstream, endpoints, config.recent_window, config.manifest_timeout),
        pipeline,
        executor.clone(),
        settings.clone(),
        LoopTimings {
            poll_interval: config.poll_interval,
            error_backoff: config.error_backoff,
        },
        config.scene_timezone,
    );

    // 3. Background tasks
    let shutdown = CancellationToken::new();
    let processor = tokio::spawn(orchestrator.run(shutdown.clone()));
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });
    #[cfg(unix)]
    if let Some(path) = config.effect_config.clone() {
        tokio::spawn(reload_on_hangup(settings.clone(), path, shutdown.clone()));
    }

    // 4. HTTP layer
    let app = http::router(AppState {
        publisher,
        store,
        stats,
        executor,
        settings,
    });

    // 5. Start server
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), workers = config.transform_workers, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await?;

    if let Err(e) = processor.await {
        error!(error = %e, "Processor task ended abnormally");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn initial_settings(config: &LiveConfig) -> EffectSettings {
    let Some(path) = &config.effect_config else {
        return EffectSettings::default();
    };
    match settings::load_file(path).await {
        Ok(loaded) => {
            info!(path = %path.display(), "Loaded effect settings");
            loaded
        }
        Err(e) => {
            warn!(error = %e, "Using default effect settings");
            EffectSettings::default()
        }
    }
}

#[cfg(unix)]
async fn reload_on_hangup(
    settings: SettingsHandle,
    path: std::path::PathBuf,
    shutdown: CancellationToken,
) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            error!(error = %e, "Failed to install SIGHUP handler");
            return;
        }
    };
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            received = hangup.recv() => {
                if received.is_none() {
                    return;
                }
            }
        }
        match settings.reload_from(&path).await {
            Ok(version) => info!(version, "Effect settings reloaded; applies to new segments"),
            Err(e) => warn!(error = %e, "Effect settings reload failed; keeping current"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
