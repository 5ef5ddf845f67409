//! Reelhouse-Media: HLS manifests and rendition tables
//!
//! This crate turns a catalogued media record into an HLS manifest whose
//! segments are transcoded on demand, and holds the fixed tables that decide
//! which renditions a client may ask for.
//!
//! # Modules
//!
//! - `hls` - Segment planning and M3U8 rendering
//! - `ladder` - Named resolutions and the bitrate ladder
//!
//! # Example
//!
//! ```
//! use reelhouse_common::MediaId;
//! use reelhouse_media::{PlaylistGenerator, Resolution, StreamSelection, StreamSource};
//!
//! let source = StreamSource {
//!     media_id: MediaId::from(1),
//!     duration_ms: 25_000,
//!     native: Resolution::new(1280, 720),
//! };
//! let selection = StreamSelection {
//!     bitrate_kbps: 500,
//!     resolution: "360p".to_string(),
//!     language: 1,
//! };
//!
//! let manifest = PlaylistGenerator::new("").generate(&source, &selection);
//! assert!(manifest.contains("/segment/1.ts?seek=20&dur=5"));
//! ```

pub mod error;
pub mod hls;
pub mod ladder;

pub use error::{Error, Result};
pub use hls::{MediaPlaylist, PlaylistGenerator, StreamSelection, StreamSource};
pub use ladder::{
    named_resolution, offerable_bitrates, offerable_resolutions, resolve_resolution, Resolution,
    BITRATE_LADDER, RESOLUTIONS,
};
