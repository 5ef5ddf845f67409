//! Direct streaming with HTTP range requests.
//!
//! Serves media files directly with support for HTTP range requests.

use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Serve a file with range request support.
pub async fn serve_file(
    file_path: &Path,
    content_type: &str,
    headers: &HeaderMap,
) -> Result<Response, StatusCode> {
    let metadata = tokio::fs::metadata(file_path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    let file_size = metadata.len();

    // Parse range header if present
    let range = headers
        .get(header::RANGE)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| parse_range_header(s, file_size));

    let mut file = File::open(file_path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    match range {
        Some((start, end)) => {
            let length = end - start + 1;

            file.seek(SeekFrom::Start(start))
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

            let body = Body::from_stream(ReaderStream::new(file.take(length)));

            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, length.to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, file_size),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .body(body)
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
        }
        None => {
            let body = Body::from_stream(ReaderStream::new(file));

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, file_size.to_string())
                .header(header::ACCEPT_RANGES, "bytes")
                .body(body)
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Parse HTTP Range header.
///
/// Supports formats:
/// - bytes=0-499
/// - bytes=500-
/// - bytes=-500 (last 500 bytes)
fn parse_range_header(header: &str, file_size: u64) -> Option<(u64, u64)> {
    if file_size == 0 {
        return None;
    }

    let (start, end) = header.strip_prefix("bytes=")?.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        // bytes=-500
        (true, false) => {
            let suffix_len: u64 = end.parse().ok()?;
            if suffix_len == 0 {
                return None;
            }
            Some((file_size.saturating_sub(suffix_len), file_size - 1))
        }
        // bytes=500-
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            (start < file_size).then_some((start, file_size - 1))
        }
        // bytes=0-499
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse::<u64>().ok()?.min(file_size - 1);
            (start < file_size && start <= end).then_some((start, end))
        }
        (true, true) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_header_full_range() {
        assert_eq!(parse_range_header("bytes=0-499", 1000), Some((0, 499)));
    }

    #[test]
    fn test_parse_range_header_open_end() {
        assert_eq!(parse_range_header("bytes=500-", 1000), Some((500, 999)));
    }

    #[test]
    fn test_parse_range_header_suffix() {
        assert_eq!(parse_range_header("bytes=-200", 1000), Some((800, 999)));
        assert_eq!(parse_range_header("bytes=-0", 1000), None);
    }

    #[test]
    fn test_parse_range_header_clamped() {
        assert_eq!(parse_range_header("bytes=0-2000", 1000), Some((0, 999)));
    }

    #[test]
    fn test_parse_range_header_invalid() {
        assert_eq!(parse_range_header("bytes=1500-", 1000), None);
        assert_eq!(parse_range_header("bytes=-", 1000), None);
        assert_eq!(parse_range_header("bytes=abc-def", 1000), None);
        assert_eq!(parse_range_header("bytes=5-2", 1000), None);
        assert_eq!(parse_range_header("items=0-1", 1000), None);
        assert_eq!(parse_range_header("bytes=0-1", 0), None);
    }

    #[tokio::test]
    async fn test_serve_file_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, "bytes=2-5".parse().unwrap());

        let resp = serve_file(&path, "video/mp4", &headers).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "4");
    }

    #[tokio::test]
    async fn test_serve_missing_file() {
        let err = serve_file(Path::new("/no/such/clip.mp4"), "video/mp4", &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }
}
