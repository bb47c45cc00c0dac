//! Media delivery endpoints (§4.18): direct-play/direct-stream file serving and transcode
//! segment/manifest serving. Each `PlaybackSession`'s `StreamPlan` (built by
//! `services::playback::PlaybackOrchestrator::start`) decides which of these a client is
//! pointed at.
//!
//! Segment and manifest files under a transcode job's `Paths::transcode_job_dir` are written by
//! whatever process actually runs `ffmpeg` for that job; this crate's `FfmpegService` only
//! probes media (`services/ffmpeg.rs`), so these routes serve what's already on disk rather than
//! driving the encode themselves.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use uuid::Uuid;

use crate::AppState;

/// GET /api/stream/part/:part_uuid — direct-play or direct-stream serving of a media part's
/// underlying file, with byte-range support handled by `ServeFile`.
async fn serve_part(State(state): State<AppState>, Path(part_uuid): Path<Uuid>, request: Request) -> impl IntoResponse {
    let part = match state.db.media_parts().get_by_uuid(part_uuid).await {
        Ok(Some(part)) => part,
        Ok(None) => return (StatusCode::NOT_FOUND, "media part not found").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to look up media part");
            return (StatusCode::INTERNAL_SERVER_ERROR, "lookup failed").into_response();
        }
    };

    match ServeFile::new(&part.absolute_path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(err) => match err {},
    }
}

/// GET /api/stream/transcode/:job_uuid/:file — serves a manifest or segment file already
/// written into the job's output directory.
async fn serve_transcode_file(
    State(state): State<AppState>,
    Path((job_uuid, file_name)): Path<(Uuid, String)>,
    request: Request,
) -> impl IntoResponse {
    let job = match state.db.transcode_jobs().get_by_uuid(job_uuid).await {
        Ok(Some(job)) => job,
        Ok(None) => return (StatusCode::NOT_FOUND, "transcode job not found").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to look up transcode job");
            return (StatusCode::INTERNAL_SERVER_ERROR, "lookup failed").into_response();
        }
    };

    if file_name.contains("..") || file_name.contains('/') {
        return (StatusCode::BAD_REQUEST, "invalid file name").into_response();
    }

    let path = std::path::Path::new(&job.output_path).join(&file_name);
    match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => {
            if response.status() == StatusCode::NOT_FOUND {
                (StatusCode::NOT_FOUND, "segment not ready yet").into_response()
            } else {
                response.into_response()
            }
        }
        Err(err) => match err {},
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stream/part/{part_uuid}", get(serve_part))
        .route("/stream/transcode/{job_uuid}/{file_name}", get(serve_transcode_file))
}
