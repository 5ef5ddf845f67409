//! Locating the command-line tools reelhouse shells out to.
//!
//! `mediainfo` and `ffprobe` back the metadata extractors; `ffmpeg` backs the
//! default transcoder profile. Custom profiles may name other programs, which
//! are resolved when a segment is requested rather than here.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// What reelhouse uses a tool for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolRole {
    /// Reads media attributes during a scan.
    Extraction,
    /// Produces HLS segments.
    Transcoding,
}

impl std::fmt::Display for ToolRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolRole::Extraction => write!(f, "metadata extraction"),
            ToolRole::Transcoding => write!(f, "transcoding"),
        }
    }
}

/// Tools checked by [`check_tools`], with the flag each one prints its
/// version for.
const KNOWN_TOOLS: &[(&str, &str, ToolRole)] = &[
    ("mediainfo", "--version", ToolRole::Extraction),
    ("ffprobe", "-version", ToolRole::Extraction),
    ("ffmpeg", "-version", ToolRole::Transcoding),
];

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub role: ToolRole,
    pub available: bool,
    /// Version line reported by the tool.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Check whether a tool runs, asking it for its version with `version_arg`.
///
/// # Example
///
/// ```no_run
/// use reelhouse_av::{check_tool, tools::ToolRole};
///
/// let info = check_tool("mediainfo", "--version", ToolRole::Extraction);
/// if info.available {
///     println!("mediainfo version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str, version_arg: &str, role: ToolRole) -> ToolInfo {
    let mut info = ToolInfo {
        name: name.to_string(),
        role,
        available: false,
        version: None,
        path: None,
    };

    if let Ok(output) = Command::new(name).arg(version_arg).output() {
        if output.status.success() {
            info.available = true;
            info.version = version_line(&String::from_utf8_lossy(&output.stdout));
            info.path = which::which(name).ok();
        }
    }

    info
}

/// Check every tool the extractors and the default transcoder rely on.
pub fn check_tools() -> Vec<ToolInfo> {
    KNOWN_TOOLS
        .iter()
        .map(|(name, arg, role)| check_tool(name, arg, *role))
        .collect()
}

/// Pick the line that carries the version out of `--version` output.
///
/// ffprobe leads with it; mediainfo prints a banner line first and the
/// library version after it.
fn version_line(stdout: &str) -> Option<String> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next()?;

    if first.chars().any(|c| c.is_ascii_digit()) {
        return Some(first.to_string());
    }

    // Banner without a number; fall back to it if nothing better follows
    Some(
        lines
            .find(|l| l.chars().any(|c| c.is_ascii_digit()))
            .unwrap_or(first)
            .to_string(),
    )
}

/// Require that a tool is on `PATH`, returning its path.
///
/// # Errors
///
/// Returns [`Error::ToolNotFound`] if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Resolve a tool, preferring a configured path over `PATH` lookup.
///
/// A configured path that does not exist is ignored.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }

    require_tool(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tool_not_found() {
        let info = check_tool("nonexistent_tool_12345", "--version", ToolRole::Extraction);
        assert!(!info.available);
        assert!(info.version.is_none());
        assert!(info.path.is_none());
        assert_eq!(info.role, ToolRole::Extraction);
    }

    #[test]
    fn test_check_tools_covers_extractors_and_transcoder() {
        let tools = check_tools();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["mediainfo", "ffprobe", "ffmpeg"]);
        assert_eq!(tools[2].role, ToolRole::Transcoding);
    }

    #[test]
    fn test_version_line_skips_mediainfo_banner() {
        let out = "MediaInfo Command line, \nMediaInfoLib - v23.04\n";
        assert_eq!(version_line(out).as_deref(), Some("MediaInfoLib - v23.04"));
    }

    #[test]
    fn test_version_line_ffprobe() {
        let out = "ffprobe version 6.1.1 Copyright (c) 2007-2023\nbuilt with gcc 13\n";
        assert_eq!(
            version_line(out).as_deref(),
            Some("ffprobe version 6.1.1 Copyright (c) 2007-2023")
        );
    }

    #[test]
    fn test_version_line_without_numbers() {
        assert_eq!(version_line("\n  custom tool\n").as_deref(), Some("custom tool"));
        assert_eq!(version_line(""), None);
    }

    #[test]
    fn test_require_tool_not_found() {
        assert!(matches!(
            require_tool("nonexistent_tool_12345"),
            Err(Error::ToolNotFound { .. })
        ));
    }

    #[test]
    fn test_configured_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("mediainfo");
        std::fs::write(&fake, b"").unwrap();

        let path = get_tool_path("nonexistent_tool_12345", Some(&fake)).unwrap();
        assert_eq!(path, fake);
    }

    #[test]
    fn test_missing_configured_path_falls_back_to_path() {
        let missing = Path::new("/nonexistent/dir/mediainfo");
        assert!(matches!(
            get_tool_path("nonexistent_tool_12345", Some(missing)),
            Err(Error::ToolNotFound { .. })
        ));
    }
}
