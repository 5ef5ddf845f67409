//! MediaInfo-based metadata extraction.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::extract::{
    MediaAttributes, MetadataExtractor, FALLBACK_BITRATE_KBPS, UNKNOWN_LANGUAGE,
};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct MediaInfoOutput {
    media: Option<MediaInfoMedia>,
}

#[derive(Debug, Deserialize)]
struct MediaInfoMedia {
    #[serde(default)]
    track: Vec<MediaInfoTrack>,
}

#[derive(Debug, Deserialize)]
struct MediaInfoTrack {
    #[serde(rename = "@type")]
    track_type: String,
    #[serde(rename = "Duration")]
    duration: Option<String>,
    #[serde(rename = "OverallBitRate")]
    overall_bit_rate: Option<String>,
    #[serde(rename = "Width")]
    width: Option<String>,
    #[serde(rename = "Height")]
    height: Option<String>,
    #[serde(rename = "BitRate")]
    bit_rate: Option<String>,
    #[serde(rename = "BitRate_Nominal")]
    bit_rate_nominal: Option<String>,
    #[serde(rename = "Language")]
    language: Option<String>,
}

/// Extracts attributes with `mediainfo --Output=JSON`.
#[derive(Debug, Clone)]
pub struct MediaInfoExtractor {
    program: PathBuf,
}

impl Default for MediaInfoExtractor {
    fn default() -> Self {
        Self::with_program("mediainfo")
    }
}

impl MediaInfoExtractor {
    /// Use a specific `mediainfo` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MetadataExtractor for MediaInfoExtractor {
    fn name(&self) -> &'static str {
        "mediainfo"
    }

    fn extract(&self, path: &Path) -> Result<MediaAttributes> {
        let output = Command::new(&self.program)
            .args(["--Output=JSON"])
            .arg(path)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found("mediainfo")
                } else {
                    Error::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed("mediainfo", stderr.to_string()));
        }

        let json_str = String::from_utf8(output.stdout)
            .map_err(|e| Error::parse_error("mediainfo", format!("Invalid UTF-8: {}", e)))?;

        parse_mediainfo_json(&json_str)
    }
}

/// Turn `mediainfo --Output=JSON` output into attributes.
///
/// The video bitrate comes from the first video track's `BitRate`, then its
/// `BitRate_Nominal`, then the container's `OverallBitRate`, then
/// [`FALLBACK_BITRATE_KBPS`].
pub fn parse_mediainfo_json(json: &str) -> Result<MediaAttributes> {
    let output: MediaInfoOutput = serde_json::from_str(json)?;
    let tracks = output
        .media
        .map(|m| m.track)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::parse_error("mediainfo", "no tracks reported"))?;

    let mut attrs = MediaAttributes::default();
    let mut overall_bps = None;
    let mut video_bps = None;
    let mut seen_video = false;

    for track in tracks {
        match track.track_type.as_str() {
            "General" => {
                attrs.duration_ms = track
                    .duration
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .map(|secs| (secs * 1000.0).round() as u64)
                    .unwrap_or(0);
                overall_bps = track.overall_bit_rate.as_deref().and_then(parse_numeric::<f64>);
            }
            "Video" if !seen_video => {
                seen_video = true;
                attrs.width = track.width.as_deref().and_then(parse_numeric).unwrap_or(0);
                attrs.height = track.height.as_deref().and_then(parse_numeric).unwrap_or(0);
                video_bps = track
                    .bit_rate
                    .as_deref()
                    .and_then(parse_numeric::<f64>)
                    .or_else(|| track.bit_rate_nominal.as_deref().and_then(parse_numeric::<f64>));
            }
            "Audio" => {
                let language = track
                    .language
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());
                attrs.audio_tracks.push(language);
            }
            _ => {}
        }
    }

    attrs.bitrate_kbps = video_bps
        .or(overall_bps)
        .map(|bps| (bps / 1000.0) as u32)
        .filter(|kbps| *kbps > 0)
        .unwrap_or(FALLBACK_BITRATE_KBPS);

    Ok(attrs)
}

fn parse_numeric<T: std::str::FromStr>(s: &str) -> Option<T> {
    // MediaInfo sometimes appends units, or reports "4500000 / 3000000" for VBR
    s.split(['/', ' '])
        .find(|part| !part.is_empty())
        .and_then(|n| n.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "creatingLibrary": {"name": "MediaInfoLib", "version": "23.04"},
        "media": {
            "@ref": "/srv/videos/clip.mkv",
            "track": [
                {"@type": "General", "Format": "Matroska", "Duration": "25.040", "OverallBitRate": "5200000"},
                {"@type": "Video", "Format": "AVC", "Width": "1920", "Height": "1080", "BitRate": "4500000"},
                {"@type": "Audio", "Format": "AAC", "Language": "en"},
                {"@type": "Audio", "Format": "AC-3"},
                {"@type": "Text", "Format": "UTF-8", "Language": "fr"}
            ]
        }
    }"#;

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric::<u32>("1920 pixels"), Some(1920));
        assert_eq!(parse_numeric::<u32>("1080"), Some(1080));
        assert_eq!(parse_numeric::<f64>("4500000 / 3000000"), Some(4_500_000.0));
        assert_eq!(parse_numeric::<u32>("abc"), None);
    }

    #[test]
    fn test_parse_sample() {
        let attrs = parse_mediainfo_json(SAMPLE).unwrap();
        assert_eq!(attrs.duration_ms, 25_040);
        assert_eq!((attrs.width, attrs.height), (1920, 1080));
        assert_eq!(attrs.bitrate_kbps, 4500);
        assert_eq!(attrs.audio_tracks, vec!["en", "und"]);
    }

    #[test]
    fn test_bitrate_falls_back_to_nominal_then_overall() {
        let nominal = r#"{"media": {"track": [
            {"@type": "General", "Duration": "10", "OverallBitRate": "900000"},
            {"@type": "Video", "Width": "640", "Height": "360", "BitRate_Nominal": "700000"}
        ]}}"#;
        assert_eq!(parse_mediainfo_json(nominal).unwrap().bitrate_kbps, 700);

        let overall = r#"{"media": {"track": [
            {"@type": "General", "Duration": "10", "OverallBitRate": "900000"},
            {"@type": "Video", "Width": "640", "Height": "360"}
        ]}}"#;
        assert_eq!(parse_mediainfo_json(overall).unwrap().bitrate_kbps, 900);
    }

    #[test]
    fn test_missing_bitrate_uses_fallback() {
        let audio_only = r#"{"media": {"track": [
            {"@type": "General", "Duration": "10"},
            {"@type": "Audio", "Language": "en"}
        ]}}"#;
        let attrs = parse_mediainfo_json(audio_only).unwrap();
        assert_eq!(attrs.bitrate_kbps, FALLBACK_BITRATE_KBPS);
        assert_eq!((attrs.width, attrs.height), (0, 0));
    }

    #[test]
    fn test_parse_rejects_empty_media() {
        assert!(parse_mediainfo_json(r#"{"media": null}"#).is_err());
        assert!(parse_mediainfo_json(r#"{"media": {"track": []}}"#).is_err());
        assert!(parse_mediainfo_json("not json").is_err());
    }

    #[test]
    fn test_missing_program() {
        let extractor = MediaInfoExtractor::with_program("/nonexistent/mediainfo");
        let result = extractor.extract(Path::new("/tmp/whatever.mkv"));
        assert!(matches!(result, Err(Error::ToolNotFound { .. })));
    }
}
