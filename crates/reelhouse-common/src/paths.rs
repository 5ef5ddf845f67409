//! Path utilities for filtering video files and normalising catalog paths.
//!
//! The scanner and the cleanup pass must agree on which files belong in the
//! catalog, so both go through [`has_allowed_extension`].

use std::path::{Component, Path, PathBuf};

/// Video file extensions indexed when no explicit list is configured.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["avi", "m4v", "mkv", "mov", "mp4", "mpg", "webm"];

/// Check if a path has one of the default video file extensions.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use reelhouse_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.mkv")));
/// assert!(is_video_file(Path::new("/path/to/video.MP4")));
/// assert!(!is_video_file(Path::new("subtitle.srt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    file_extension(path)
        .map(|ext| DEFAULT_VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Check if a path's extension (case-insensitive) is in `extensions`.
///
/// `extensions` is expected to be lowercase without the leading dot.
pub fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    file_extension(path)
        .map(|ext| extensions.iter().any(|allowed| *allowed == ext))
        .unwrap_or(false)
}

/// Lowercased extension of a path, if it has one.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_lowercase())
}

/// Normalise a path lexically: drops `.` components, repeated separators,
/// and trailing separators. `..` components are kept as-is.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use reelhouse_common::paths::normalize_path;
///
/// assert_eq!(normalize_path(Path::new("/media//videos/./")), PathBuf::from("/media/videos"));
/// ```
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Check whether `path` is `root` or lies beneath it, comparing whole
/// components (so `/media/a` does not contain `/media/ab`).
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}
