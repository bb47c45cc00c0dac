//! Artwork serving endpoint: streams the cached file `Paths::artwork_dir(uuid)/<role>.<ext>`
//! written by `services::artwork::cache_artwork` (§6 filesystem layout, §4.4 image selection).

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use uuid::Uuid;

use crate::services::artwork::ArtworkRole;
use crate::AppState;

fn parse_role(role: &str) -> Option<ArtworkRole> {
    match role {
        "poster" => Some(ArtworkRole::Poster),
        "backdrop" => Some(ArtworkRole::Backdrop),
        "thumbnail" => Some(ArtworkRole::Thumbnail),
        "banner" => Some(ArtworkRole::Banner),
        "logo" => Some(ArtworkRole::Logo),
        _ => None,
    }
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

/// GET /api/artwork/:uuid/:role
async fn serve_artwork(State(state): State<AppState>, Path((item_uuid, role)): Path<(Uuid, String)>) -> impl IntoResponse {
    let Some(role) = parse_role(&role) else {
        return (StatusCode::BAD_REQUEST, "unknown artwork role").into_response();
    };

    let dir = state.paths.artwork_dir(&item_uuid);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(_) => return (StatusCode::NOT_FOUND, "artwork not found").into_response(),
    };

    let prefix = format!("{}.", role.as_str());
    let mut found = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) {
            found = Some(entry.path());
            break;
        }
    }

    let Some(path) = found else {
        return (StatusCode::NOT_FOUND, "artwork not found").into_response();
    };

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let headers = [
                (header::CONTENT_TYPE, content_type_for(extension)),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ];
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "failed to read cached artwork");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to read artwork").into_response()
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/artwork/{item_uuid}/{role}", get(serve_artwork))
}
