//! Segment request parameters and their validation.

use reelhouse_db::models::Media;
use reelhouse_media::{named_resolution, Resolution};
use serde::Deserialize;

use super::TranscodeError;

/// Longest segment a client may request, in seconds.
pub const MAX_SEGMENT_SECONDS: u32 = 10;
/// Accepted bitrate range in kbps.
pub const BITRATE_RANGE: std::ops::RangeInclusive<u32> = 32..=100_000;
/// Accepted range for each side of a `WIDTHxHEIGHT` resolution.
pub const DIMENSION_RANGE: std::ops::RangeInclusive<u32> = 16..=8192;
/// Frame size used when a request names none.
pub const DEFAULT_RESOLUTION: Resolution = Resolution::new(640, 360);

/// Raw query string of a segment request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentQuery {
    pub seek: Option<String>,
    pub dur: Option<String>,
    pub br: Option<String>,
    pub res: Option<String>,
    pub lang: Option<String>,
}

/// What validation needs to know about the media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaLimits {
    /// Whole seconds, when the duration is known.
    pub duration_secs: Option<u64>,
    pub audio_tracks: u32,
}

impl MediaLimits {
    pub fn of(media: &Media) -> Self {
        Self {
            duration_secs: (media.duration_ms > 0).then(|| media.duration_ms as u64 / 1000),
            audio_tracks: media.audio_track_count,
        }
    }
}

/// Validated parameters for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentParams {
    /// Start offset in seconds.
    pub seek: u64,
    /// Length in seconds.
    pub duration: u32,
    pub bitrate_kbps: u32,
    pub resolution: Resolution,
    /// 1-based audio track.
    pub language: u32,
}

impl SegmentParams {
    /// Validate a request, filling defaults for absent parameters.
    pub fn validate(
        query: &SegmentQuery,
        limits: &MediaLimits,
        default_bitrate: u32,
    ) -> Result<Self, TranscodeError> {
        let seek = match &query.seek {
            Some(raw) => {
                let seek = parse_number::<u64>("seek", raw)?;
                if let Some(max) = limits.duration_secs {
                    if seek > max {
                        return Err(invalid("seek", raw, format!("beyond media duration {}s", max)));
                    }
                }
                seek
            }
            None => 0,
        };

        let duration = match &query.dur {
            Some(raw) => {
                let dur = parse_number::<u32>("dur", raw)?;
                if !(1..=MAX_SEGMENT_SECONDS).contains(&dur) {
                    return Err(invalid("dur", raw, format!("must be 1..={}", MAX_SEGMENT_SECONDS)));
                }
                dur
            }
            None => MAX_SEGMENT_SECONDS,
        };

        let bitrate_kbps = match &query.br {
            Some(raw) => {
                let br = parse_number::<u32>("br", raw)?;
                if !BITRATE_RANGE.contains(&br) {
                    return Err(invalid(
                        "br",
                        raw,
                        format!("must be {}..={}", BITRATE_RANGE.start(), BITRATE_RANGE.end()),
                    ));
                }
                br
            }
            None => default_bitrate,
        };

        let resolution = match &query.res {
            Some(raw) => parse_resolution(raw)?,
            None => DEFAULT_RESOLUTION,
        };

        let max_language = limits.audio_tracks.max(1);
        let language = match &query.lang {
            Some(raw) => {
                let lang = parse_number::<u32>("lang", raw)?;
                if !(1..=max_language).contains(&lang) {
                    return Err(invalid("lang", raw, format!("must be 1..={}", max_language)));
                }
                lang
            }
            None => 1,
        };

        Ok(Self {
            seek,
            duration,
            bitrate_kbps,
            resolution,
            language,
        })
    }
}

/// Format seconds as `H:MM:SS`.
pub fn format_seek(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn invalid(name: &'static str, value: &str, reason: impl Into<String>) -> TranscodeError {
    TranscodeError::InvalidSegmentParameter {
        name,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, TranscodeError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(name, raw, "not a non-negative integer"));
    }
    raw.parse::<T>()
        .map_err(|_| invalid(name, raw, "out of range"))
}

fn parse_resolution(raw: &str) -> Result<Resolution, TranscodeError> {
    if let Some(named) = named_resolution(raw) {
        return Ok(named);
    }

    let res: Resolution = raw
        .parse()
        .map_err(|_| invalid("res", raw, "expected WIDTHxHEIGHT or a named resolution"))?;

    if !DIMENSION_RANGE.contains(&res.width) || !DIMENSION_RANGE.contains(&res.height) {
        return Err(invalid(
            "res",
            raw,
            format!(
                "each side must be {}..={}",
                DIMENSION_RANGE.start(),
                DIMENSION_RANGE.end()
            ),
        ));
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> MediaLimits {
        MediaLimits {
            duration_secs: Some(25),
            audio_tracks: 2,
        }
    }

    fn query(pairs: &[(&str, &str)]) -> SegmentQuery {
        let mut q = SegmentQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "seek" => q.seek = v,
                "dur" => q.dur = v,
                "br" => q.br = v,
                "res" => q.res = v,
                "lang" => q.lang = v,
                _ => unreachable!(),
            }
        }
        q
    }

    fn rejected(pairs: &[(&str, &str)]) -> &'static str {
        match SegmentParams::validate(&query(pairs), &limits(), 1500) {
            Err(TranscodeError::InvalidSegmentParameter { name, .. }) => name,
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let params = SegmentParams::validate(&SegmentQuery::default(), &limits(), 1500).unwrap();
        assert_eq!(
            params,
            SegmentParams {
                seek: 0,
                duration: 10,
                bitrate_kbps: 1500,
                resolution: Resolution::new(640, 360),
                language: 1,
            }
        );
    }

    #[test]
    fn test_accepts_valid_request() {
        let params = SegmentParams::validate(
            &query(&[("seek", "20"), ("dur", "5"), ("br", "700"), ("res", "720p"), ("lang", "2")]),
            &limits(),
            1500,
        )
        .unwrap();
        assert_eq!(params.seek, 20);
        assert_eq!(params.duration, 5);
        assert_eq!(params.bitrate_kbps, 700);
        assert_eq!(params.resolution, Resolution::new(1280, 720));
        assert_eq!(params.language, 2);
    }

    #[test]
    fn test_seek_bounds() {
        assert_eq!(rejected(&[("seek", "26")]), "seek");
        assert_eq!(rejected(&[("seek", "-1")]), "seek");
        assert_eq!(rejected(&[("seek", "1.5")]), "seek");
        // Upper bound is inclusive
        assert!(SegmentParams::validate(&query(&[("seek", "25")]), &limits(), 1500).is_ok());
    }

    #[test]
    fn test_unknown_duration_allows_any_seek() {
        let limits = MediaLimits {
            duration_secs: None,
            audio_tracks: 0,
        };
        assert!(SegmentParams::validate(&query(&[("seek", "99999")]), &limits, 1500).is_ok());
    }

    #[test]
    fn test_duration_bounds() {
        assert_eq!(rejected(&[("dur", "0")]), "dur");
        assert_eq!(rejected(&[("dur", "11")]), "dur");
    }

    #[test]
    fn test_bitrate_bounds() {
        assert_eq!(rejected(&[("br", "31")]), "br");
        assert_eq!(rejected(&[("br", "100001")]), "br");
        assert_eq!(rejected(&[("br", "abc")]), "br");
        assert_eq!(rejected(&[("br", "99999999999999999999")]), "br");
    }

    #[test]
    fn test_resolution_bounds() {
        assert_eq!(rejected(&[("res", "15x360")]), "res");
        assert_eq!(rejected(&[("res", "640x9000")]), "res");
        assert_eq!(rejected(&[("res", "4k")]), "res");
        assert_eq!(rejected(&[("res", "640x360;rm")]), "res");
    }

    #[test]
    fn test_language_bounds() {
        assert_eq!(rejected(&[("lang", "0")]), "lang");
        assert_eq!(rejected(&[("lang", "3")]), "lang");

        let silent = MediaLimits {
            duration_secs: Some(25),
            audio_tracks: 0,
        };
        assert!(SegmentParams::validate(&query(&[("lang", "1")]), &silent, 1500).is_ok());
    }

    #[test]
    fn test_format_seek() {
        assert_eq!(format_seek(0), "0:00:00");
        assert_eq!(format_seek(65), "0:01:05");
        assert_eq!(format_seek(3_725), "1:02:05");
        assert_eq!(format_seek(36_000), "10:00:00");
    }
}
