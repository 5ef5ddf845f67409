//! Fixed resolution table and bitrate ladder.
//!
//! Both tables are immutable; they decide what a client is offered and how
//! a named resolution maps to a frame size.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Label offered for the media's own frame size.
pub const ORIGINAL: &str = "Original";

/// A frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    /// Parse `WIDTHxHEIGHT`. Bounds are left to the caller.
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| Error::invalid_resolution(s))?;

        let parse = |part: &str| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::invalid_resolution(s));
            }
            part.parse::<u32>().map_err(|_| Error::invalid_resolution(s))
        };

        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

/// Named resolutions, smallest first.
pub const RESOLUTIONS: &[(&str, Resolution)] = &[
    ("144p", Resolution::new(256, 144)),
    ("240p", Resolution::new(426, 240)),
    ("360p", Resolution::new(640, 360)),
    ("480p", Resolution::new(854, 480)),
    ("720p", Resolution::new(1280, 720)),
    ("1080p", Resolution::new(1920, 1080)),
];

/// Bitrates (kbps) offered below a media's own bitrate.
pub const BITRATE_LADDER: &[u32] = &[
    200, 300, 400, 500, 700, 1200, 1500, 1700, 2000, 2500, 3000, 4000, 5000, 6000,
];

/// Look up a named resolution such as `720p`.
pub fn named_resolution(name: &str) -> Option<Resolution> {
    RESOLUTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, res)| *res)
}

/// Map a requested resolution name to a frame size, falling back to the
/// media's native size for names not in the table.
pub fn resolve_resolution(name: &str, native: Resolution) -> Resolution {
    named_resolution(name).unwrap_or(native)
}

/// The media's own bitrate followed by every ladder value not exceeding it.
pub fn offerable_bitrates(media_kbps: u32) -> Vec<u32> {
    std::iter::once(media_kbps)
        .chain(BITRATE_LADDER.iter().copied().filter(|b| *b <= media_kbps))
        .collect()
}

/// `Original` followed by every named resolution that fits the native frame
/// in at least one dimension.
pub fn offerable_resolutions(native: Resolution) -> Vec<String> {
    std::iter::once(ORIGINAL.to_string())
        .chain(
            RESOLUTIONS
                .iter()
                .filter(|(_, r)| r.width <= native.width || r.height <= native.height)
                .map(|(name, _)| name.to_string()),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parse_and_display() {
        let res: Resolution = "1280x720".parse().unwrap();
        assert_eq!(res, Resolution::new(1280, 720));
        assert_eq!(res.to_string(), "1280x720");

        for bad in ["", "1280", "x720", "1280x", "12a0x720", "-1x5", "1280x720x1", " 1x1"] {
            assert!(bad.parse::<Resolution>().is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_resolve_resolution() {
        let native = Resolution::new(1920, 800);
        assert_eq!(resolve_resolution("360p", native), Resolution::new(640, 360));
        assert_eq!(resolve_resolution("1080p", native), Resolution::new(1920, 1080));
        assert_eq!(resolve_resolution("4k", native), native);
        assert_eq!(resolve_resolution("Original", native), native);
    }

    #[test]
    fn test_offerable_bitrates() {
        assert_eq!(offerable_bitrates(1600), vec![1600, 200, 300, 400, 500, 700, 1200, 1500]);
        assert_eq!(offerable_bitrates(150), vec![150]);
        assert_eq!(offerable_bitrates(500).last(), Some(&500));
    }

    #[test]
    fn test_offerable_resolutions() {
        assert_eq!(
            offerable_resolutions(Resolution::new(854, 480)),
            vec!["Original", "144p", "240p", "360p", "480p"]
        );
        // Wide but short frames still qualify by width
        assert_eq!(
            offerable_resolutions(Resolution::new(1920, 200)).len(),
            RESOLUTIONS.len() + 1
        );
        assert_eq!(offerable_resolutions(Resolution::new(0, 0)), vec!["Original"]);
    }
}
