//! Transcoded segment delivery.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};

use super::{load_media, parse_media_file};
use crate::server::AppContext;
use crate::transcode::{SegmentQuery, TranscodeError};

/// Stream one segment straight from the transcoder's stdout.
///
/// The transcoder is killed if the client disconnects mid-segment.
pub async fn transcode_segment(
    State(ctx): State<AppContext>,
    Path(file): Path<String>,
    Query(query): Query<SegmentQuery>,
) -> Result<Response, StatusCode> {
    let (media_id, format) = parse_media_file(&file).ok_or(StatusCode::BAD_REQUEST)?;
    if format != "ts" {
        return Err(StatusCode::NOT_FOUND);
    }

    let media = load_media(&ctx, media_id)?;

    let segment = ctx
        .transcoder
        .transcode_request(&media, &query)
        .map_err(|e| {
            let status = segment_error_status(&e);
            if status.is_client_error() {
                tracing::debug!(media_id = %media_id, error = %e, "Rejected segment request");
            } else {
                tracing::error!(media_id = %media_id, error = %e, "Failed to start transcode");
            }
            status
        })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, segment.content_type)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(segment.stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn segment_error_status(err: &TranscodeError) -> StatusCode {
    match err {
        TranscodeError::InvalidSegmentParameter { .. } => StatusCode::BAD_REQUEST,
        TranscodeError::ProcessFailed { .. } => StatusCode::BAD_GATEWAY,
        TranscodeError::NoProfile
        | TranscodeError::EmptyCommand
        | TranscodeError::UnknownFormat { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
