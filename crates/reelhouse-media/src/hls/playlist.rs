//! HLS media playlist structure and rendering.

use std::fmt::Write;

/// Protocol version declared by rendered playlists. Integer `#EXTINF`
/// durations need nothing newer.
pub const HLS_VERSION: u32 = 3;

/// A single-rendition VOD media playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlaylist {
    /// Target duration in seconds.
    pub target_duration: u32,
    /// Media sequence number of the first segment.
    pub media_sequence: u32,
    /// Segment entries.
    pub segments: Vec<SegmentEntry>,
}

/// A segment entry in the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Duration in whole seconds.
    pub duration: u32,
    /// Segment URI.
    pub uri: String,
}

impl MediaPlaylist {
    /// Create an empty VOD playlist.
    pub fn vod(target_duration: u32) -> Self {
        Self {
            target_duration,
            media_sequence: 0,
            segments: Vec::new(),
        }
    }

    /// Render to M3U8 text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        // Writing to a String cannot fail.
        let _ = writeln!(out, "#EXTM3U");
        let _ = writeln!(out, "#EXT-X-VERSION:{}", HLS_VERSION);
        let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration);
        let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence);
        let _ = writeln!(out, "#EXT-X-PLAYLIST-TYPE:VOD");

        for segment in &self.segments {
            let _ = writeln!(out, "#EXTINF:{},", segment.duration);
            let _ = writeln!(out, "{}", segment.uri);
        }

        let _ = writeln!(out, "#EXT-X-ENDLIST");

        out
    }
}
