use super::AppState;
use crate::application::stats::StatusReport;
use crate::domain::{ArtifactKey, SegmentId};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

const PLAYER_HTML: &str = r#"<!doctype html>
<html>
    <head>
        <title>livemorph</title>
        <script src="https://cdn.jsdelivr.net/npm/hls.js@1"></script>
    </head>
    <body style="margin:0;background:#111">
        <video id="video" controls autoplay muted style="width:100%;max-height:100vh"></video>
        <script>
            const video = document.getElementById("video");
            const src = "/api/stream";
            if (video.canPlayType("application/vnd.apple.mpegurl")) {
                video.src = src;
            } else if (Hls.isSupported()) {
                const hls = new Hls({ liveSyncDurationCount: 3 });
                hls.loadSource(src);
                hls.attachMedia(video);
            }
        </script>
    </body>
</html>
"#;

pub async fn player() -> Html<&'static str> {
    Html(PLAYER_HTML)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn playlist_response(body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

pub async fn stream_manifest(State(state): State<AppState>) -> Response {
    playlist_response(state.publisher.manifest())
}

pub async fn raw_manifest(State(state): State<AppState>) -> Response {
    playlist_response(state.publisher.raw_manifest())
}

/// `"<id>.ts"` to an id; anything else is not a segment we serve.
fn segment_id(file: &str) -> Option<SegmentId> {
    file.strip_suffix(".ts")?.parse().ok()
}

async fn segment_response(state: &AppState, key: Option<ArtifactKey>) -> Response {
    let Some(key) = key else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match state.store.read(key).await {
        Ok(Some(bytes)) => ([(header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE)], bytes).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(segment = %key.id, error = %e, "Failed to read segment");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn transformed_segment(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    segment_response(&state, segment_id(&file).map(ArtifactKey::transformed)).await
}

pub async fn raw_segment(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    segment_response(&state, segment_id(&file).map(ArtifactKey::raw)).await
}

pub async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(
        state
            .stats
            .report(state.executor.in_flight(), state.settings.version()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_file_names() {
        assert_eq!(segment_id("105.ts"), Some(SegmentId(105)));
        assert_eq!(segment_id("105"), None);
        assert_eq!(segment_id("x.ts"), None);
        assert_eq!(segment_id("-1.ts"), None);
    }
}
