//! Media streaming module.
//!
//! # Routes
//!
//! - `GET /stream/{media_id}.{format}` - Raw file for natively playable
//!   formats (with range support), otherwise an HLS manifest
//! - `GET /segment/{media_id}.ts` - One transcoded segment
//! - `GET /media/{media_id}/options` - Bitrates, resolutions and audio
//!   tracks a client may choose from

mod direct;
mod hls;
mod segment;

pub use direct::serve_file;
pub use hls::{media_options, stream_media, MediaOptions, StreamQuery};
pub use segment::transcode_segment;

use axum::{http::StatusCode, routing::get, Router};
use reelhouse_common::MediaId;
use reelhouse_db::{models::Media, queries::media};

use crate::server::AppContext;

/// Create streaming router.
pub fn streaming_router() -> Router<AppContext> {
    Router::new()
        .route("/stream/:file", get(stream_media))
        .route("/segment/:file", get(transcode_segment))
        .route("/media/:media_id/options", get(media_options))
}

/// Split `"{id}.{format}"` into its parts.
pub(crate) fn parse_media_file(file: &str) -> Option<(MediaId, String)> {
    let (id, format) = file.rsplit_once('.')?;
    if format.is_empty() {
        return None;
    }
    let id = id.parse::<MediaId>().ok()?;
    Some((id, format.to_lowercase()))
}

/// Fetch a media record or answer 404.
pub(crate) fn load_media(ctx: &AppContext, id: MediaId) -> Result<Media, StatusCode> {
    let conn = ctx.db.get().map_err(|e| {
        tracing::error!(error = %e, "Failed to get database connection");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    media::get_media(&conn, id)
        .map_err(|e| {
            tracing::error!(media_id = %id, error = %e, "Failed to load media");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}
