//! FFprobe-based metadata extraction.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::extract::{
    MediaAttributes, MetadataExtractor, FALLBACK_BITRATE_KBPS, UNKNOWN_LANGUAGE,
};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

/// Extracts attributes with `ffprobe -print_format json`.
#[derive(Debug, Clone)]
pub struct FfprobeExtractor {
    program: PathBuf,
}

impl Default for FfprobeExtractor {
    fn default() -> Self {
        Self::with_program("ffprobe")
    }
}

impl FfprobeExtractor {
    /// Use a specific `ffprobe` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MetadataExtractor for FfprobeExtractor {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn extract(&self, path: &Path) -> Result<MediaAttributes> {
        let output = Command::new(&self.program)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found("ffprobe")
                } else {
                    Error::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed("ffprobe", stderr.to_string()));
        }

        let json_str = String::from_utf8(output.stdout)
            .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

        parse_ffprobe_json(&json_str)
    }
}

/// Turn `ffprobe -show_format -show_streams` JSON into attributes.
pub fn parse_ffprobe_json(json: &str) -> Result<MediaAttributes> {
    let output: FfprobeOutput = serde_json::from_str(json)?;
    let format = output
        .format
        .ok_or_else(|| Error::parse_error("ffprobe", "no format section"))?;

    let mut attrs = MediaAttributes {
        duration_ms: format
            .duration
            .and_then(|s| s.parse::<f64>().ok())
            .map(|secs| (secs * 1000.0).round() as u64)
            .unwrap_or(0),
        ..MediaAttributes::default()
    };

    let mut video_bps = None;
    let mut seen_video = false;

    for stream in output.streams {
        match stream.codec_type.as_deref() {
            Some("video") if !seen_video => {
                seen_video = true;
                attrs.width = stream.width.unwrap_or(0);
                attrs.height = stream.height.unwrap_or(0);
                video_bps = stream.bit_rate.and_then(|s| s.parse::<u64>().ok());
            }
            Some("audio") => {
                let language = stream
                    .tags
                    .language
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());
                attrs.audio_tracks.push(language);
            }
            _ => {}
        }
    }

    let overall_bps = format.bit_rate.and_then(|s| s.parse::<u64>().ok());
    attrs.bitrate_kbps = video_bps
        .or(overall_bps)
        .map(|bps| (bps / 1000) as u32)
        .filter(|kbps| *kbps > 0)
        .unwrap_or(FALLBACK_BITRATE_KBPS);

    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample() {
        let json = r#"{
            "streams": [
                {"index": 0, "codec_type": "video", "width": 1280, "height": 720, "bit_rate": "2500000"},
                {"index": 1, "codec_type": "audio", "tags": {"language": "ger"}},
                {"index": 2, "codec_type": "audio"},
                {"index": 3, "codec_type": "subtitle", "tags": {"language": "eng"}}
            ],
            "format": {"filename": "clip.mp4", "duration": "95.500000", "bit_rate": "2700000"}
        }"#;

        let attrs = parse_ffprobe_json(json).unwrap();
        assert_eq!(attrs.duration_ms, 95_500);
        assert_eq!((attrs.width, attrs.height), (1280, 720));
        assert_eq!(attrs.bitrate_kbps, 2500);
        assert_eq!(attrs.audio_tracks, vec!["ger", "und"]);
    }

    #[test]
    fn test_matroska_uses_container_bitrate() {
        // Matroska streams rarely carry a per-stream bit_rate
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360}],
            "format": {"duration": "10.0", "bit_rate": "800000"}
        }"#;

        assert_eq!(parse_ffprobe_json(json).unwrap().bitrate_kbps, 800);
    }

    #[test]
    fn test_missing_bitrate_uses_fallback() {
        let json = r#"{
            "streams": [{"codec_type": "audio"}],
            "format": {"duration": "10.0"}
        }"#;

        assert_eq!(parse_ffprobe_json(json).unwrap().bitrate_kbps, FALLBACK_BITRATE_KBPS);
    }

    #[test]
    fn test_parse_requires_format() {
        assert!(parse_ffprobe_json(r#"{"streams": []}"#).is_err());
    }
}
