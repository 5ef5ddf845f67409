//! HLS manifests and rendition options.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reelhouse_common::{paths::file_extension, MediaId};
use reelhouse_db::models::Media;
use reelhouse_media::{
    offerable_bitrates, offerable_resolutions, Resolution, StreamSelection, StreamSource,
};
use serde::{Deserialize, Serialize};

use super::{direct::serve_file, load_media, parse_media_file};
use crate::server::AppContext;
use crate::transcode::{BITRATE_RANGE, DEFAULT_RESOLUTION};

/// MIME type of HLS manifests.
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

const DEFAULT_BITRATE_KBPS: u32 = 500;
const DEFAULT_RESOLUTION_NAME: &str = "360p";

/// Query parameters of a stream request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamQuery {
    /// Bitrate in kbps, or `original`.
    pub br: Option<String>,
    pub res: Option<String>,
    pub lang: Option<String>,
}

/// Stream a media file: the raw file when the requested format is the file's
/// own and plays natively, otherwise an HLS manifest of transcoded segments.
pub async fn stream_media(
    State(ctx): State<AppContext>,
    Path(file): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let (media_id, format) = parse_media_file(&file).ok_or(StatusCode::BAD_REQUEST)?;
    let media = load_media(&ctx, media_id)?;

    let media_path = std::path::Path::new(&media.path);
    let own_format = file_extension(media_path);
    let native = ctx
        .config
        .format(&format)
        .filter(|f| f.native && own_format.as_deref() == Some(f.name.as_str()));

    if let Some(format) = native {
        tracing::debug!(media_id = %media_id, format = %format.name, "Serving file directly");
        return serve_file(media_path, &format.mime_type, &headers).await;
    }

    let selection = stream_selection(&query, &media)?;
    let manifest = ctx.playlists.generate(&stream_source(&media), &selection);

    tracing::debug!(
        media_id = %media_id,
        bitrate = selection.bitrate_kbps,
        resolution = %selection.resolution,
        language = selection.language,
        "Generated manifest"
    );

    Ok((
        [
            (header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        manifest,
    )
        .into_response())
}

/// Renditions a client may pick for a media file.
#[derive(Debug, Serialize, Deserialize)]
pub struct MediaOptions {
    pub media_id: MediaId,
    pub duration_ms: i64,
    /// kbps, the media's own bitrate first.
    pub bitrates: Vec<u32>,
    pub resolutions: Vec<String>,
    /// Labels like `1: eng`, in track order.
    pub audio_tracks: Vec<String>,
}

/// Get the rendition options for a media file.
pub async fn media_options(
    State(ctx): State<AppContext>,
    Path(media_id): Path<String>,
) -> Result<Json<MediaOptions>, StatusCode> {
    let media_id = media_id
        .parse::<MediaId>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    let media = load_media(&ctx, media_id)?;

    Ok(Json(MediaOptions {
        media_id,
        duration_ms: media.duration_ms,
        bitrates: offerable_bitrates(media.bitrate_kbps),
        resolutions: offerable_resolutions(Resolution::new(media.width, media.height)),
        audio_tracks: audio_labels(&media.audio_languages),
    }))
}

fn audio_labels(languages: &[String]) -> Vec<String> {
    languages
        .iter()
        .enumerate()
        .map(|(i, lang)| format!("{}: {}", i + 1, lang))
        .collect()
}

fn stream_source(media: &Media) -> StreamSource {
    let native = if media.width > 0 && media.height > 0 {
        Resolution::new(media.width, media.height)
    } else {
        DEFAULT_RESOLUTION
    };

    StreamSource {
        media_id: media.id,
        duration_ms: media.duration_ms.max(0) as u64,
        native,
    }
}

fn stream_selection(query: &StreamQuery, media: &Media) -> Result<StreamSelection, StatusCode> {
    let bitrate_kbps = match query.br.as_deref() {
        None => DEFAULT_BITRATE_KBPS,
        Some(raw) if raw.eq_ignore_ascii_case("original") => {
            media.bitrate_kbps.clamp(*BITRATE_RANGE.start(), *BITRATE_RANGE.end())
        }
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|br| BITRATE_RANGE.contains(br))
            .ok_or(StatusCode::BAD_REQUEST)?,
    };

    let resolution = match query.res.as_deref() {
        None => DEFAULT_RESOLUTION_NAME.to_string(),
        Some(raw) if !raw.is_empty() && raw.len() <= 32 && raw.bytes().all(|b| b.is_ascii_alphanumeric()) => {
            raw.to_string()
        }
        Some(_) => return Err(StatusCode::BAD_REQUEST),
    };

    let max_language = media.audio_track_count.max(1);
    let language = match query.lang.as_deref() {
        None => 1,
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|lang| (1..=max_language).contains(lang))
            .ok_or(StatusCode::BAD_REQUEST)?,
    };

    Ok(StreamSelection {
        bitrate_kbps,
        resolution,
        language,
    })
}
