//! The metadata extraction contract and its composite implementations.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::ffprobe::FfprobeExtractor;
use crate::mediainfo::MediaInfoExtractor;
use crate::{Error, Result};

/// Bitrate recorded for a file whose metadata could not be extracted.
pub const FALLBACK_BITRATE_KBPS: u32 = 1000;

/// Language label used for audio tracks without a language tag.
pub const UNKNOWN_LANGUAGE: &str = "und";

/// Attributes the catalog stores for each media file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaAttributes {
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    /// Audio-track languages in stream order.
    pub audio_tracks: Vec<String>,
}

impl MediaAttributes {
    /// Attributes recorded when extraction fails.
    pub fn fallback() -> Self {
        Self {
            bitrate_kbps: FALLBACK_BITRATE_KBPS,
            ..Self::default()
        }
    }
}

/// Extracts [`MediaAttributes`] from a media file.
///
/// Implementations block; callers running inside an async runtime should
/// invoke them from a blocking task.
pub trait MetadataExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Read the catalog attributes of `path`.
    fn extract(&self, path: &Path) -> Result<MediaAttributes>;
}

/// Tries `mediainfo` first and falls back to `ffprobe`.
#[derive(Debug, Clone, Default)]
pub struct AutoExtractor {
    mediainfo: MediaInfoExtractor,
    ffprobe: FfprobeExtractor,
}

impl AutoExtractor {
    pub fn new(mediainfo: MediaInfoExtractor, ffprobe: FfprobeExtractor) -> Self {
        Self { mediainfo, ffprobe }
    }
}

impl MetadataExtractor for AutoExtractor {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn extract(&self, path: &Path) -> Result<MediaAttributes> {
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }

        let primary = match self.mediainfo.extract(path) {
            Ok(attrs) => return Ok(attrs),
            Err(e) => e,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), error = %primary, "mediainfo failed, trying ffprobe");

        self.ffprobe.extract(path).map_err(|fallback| {
            Error::extraction_failed(path, format!("mediainfo: {}; ffprobe: {}", primary, fallback))
        })
    }
}

/// Returns fixed attributes without touching the file.
///
/// Paths can be given their own attributes or marked as failing, and every
/// call is recorded so tests can assert which files were read.
#[derive(Debug, Default)]
pub struct FixedExtractor {
    attributes: MediaAttributes,
    overrides: HashMap<PathBuf, MediaAttributes>,
    failing: HashSet<PathBuf>,
    calls: Mutex<Vec<PathBuf>>,
}

impl FixedExtractor {
    pub fn new(attributes: MediaAttributes) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    /// Return `attributes` for `path` instead of the shared ones.
    pub fn with_attributes_for(mut self, path: impl Into<PathBuf>, attributes: MediaAttributes) -> Self {
        self.overrides.insert(path.into(), attributes);
        self
    }

    /// Fail every extraction of `path`.
    pub fn failing_for(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Paths extracted so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Forget recorded calls.
    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}

impl MetadataExtractor for FixedExtractor {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn extract(&self, path: &Path) -> Result<MediaAttributes> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(path.to_path_buf());
        }

        if self.failing.contains(path) {
            return Err(Error::extraction_failed(path, "configured to fail"));
        }

        Ok(self
            .overrides
            .get(path)
            .cloned()
            .unwrap_or_else(|| self.attributes.clone()))
    }
}
