//! Per-media HLS manifest generation.
//!
//! A media's timeline is cut into fixed 10-second segments. Each segment
//! entry points at the on-demand transcode endpoint with its seek offset,
//! duration and the selected bitrate, resolution and audio track.

use reelhouse_common::MediaId;

use super::playlist::{MediaPlaylist, SegmentEntry};
use crate::ladder::{resolve_resolution, Resolution};

/// Length of every segment except possibly the last.
pub const SEGMENT_SECONDS: u32 = 10;

/// One slice of a media's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSlot {
    pub index: u32,
    /// Offset from the start of the media, in seconds.
    pub seek: u32,
    /// Length in seconds, 1..=10.
    pub duration: u32,
}

/// Split a duration into segment slots.
///
/// The duration is floored to whole seconds; the final slot holds the
/// remainder, or a full 10 seconds when the duration divides evenly.
pub fn plan_segments(duration_ms: u64) -> Vec<SegmentSlot> {
    let total = (duration_ms / 1000) as u32;
    let count = total.div_ceil(SEGMENT_SECONDS);

    (0..count)
        .map(|index| {
            let seek = index * SEGMENT_SECONDS;
            SegmentSlot {
                index,
                seek,
                duration: SEGMENT_SECONDS.min(total - seek),
            }
        })
        .collect()
}

/// What the generator needs to know about a media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSource {
    pub media_id: MediaId,
    pub duration_ms: u64,
    pub native: Resolution,
}

/// The rendition a client asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSelection {
    /// Bitrate in kbps, passed through to every segment.
    pub bitrate_kbps: u32,
    /// Resolution name such as `360p`; unknown names mean native size.
    pub resolution: String,
    /// 1-based audio track index.
    pub language: u32,
}

/// Builds manifests whose segment URIs live under `base_url`.
#[derive(Debug, Clone, Default)]
pub struct PlaylistGenerator {
    base_url: String,
}

impl PlaylistGenerator {
    /// `base_url` is prefixed to `/segment/...`; pass an empty string for
    /// host-relative URIs.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the playlist for one rendition.
    pub fn playlist(&self, source: &StreamSource, selection: &StreamSelection) -> MediaPlaylist {
        let resolution = resolve_resolution(&selection.resolution, source.native);

        let mut playlist = MediaPlaylist::vod(SEGMENT_SECONDS);
        playlist.segments = plan_segments(source.duration_ms)
            .into_iter()
            .map(|slot| SegmentEntry {
                duration: slot.duration,
                uri: format!(
                    "{}/segment/{}.ts?seek={}&dur={}&br={}&res={}&lang={}",
                    self.base_url,
                    source.media_id,
                    slot.seek,
                    slot.duration,
                    selection.bitrate_kbps,
                    resolution,
                    selection.language
                ),
            })
            .collect();

        playlist
    }

    /// Render the manifest text for one rendition.
    pub fn generate(&self, source: &StreamSource, selection: &StreamSelection) -> String {
        self.playlist(source, selection).render()
    }
}
