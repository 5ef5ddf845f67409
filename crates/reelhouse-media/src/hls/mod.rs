//! HLS playlist generation.
//!
//! This module generates M3U8 media playlists for on-demand transcoded
//! segments.

mod generator;
mod playlist;

pub use generator::{
    plan_segments, PlaylistGenerator, SegmentSlot, StreamSelection, StreamSource, SEGMENT_SECONDS,
};
pub use playlist::{MediaPlaylist, SegmentEntry, HLS_VERSION};
