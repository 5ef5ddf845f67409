//! # reelhouse-av
//!
//! Media metadata extraction for video files.
//!
//! The scanner only needs a handful of attributes per file: duration, frame
//! size, bitrate and the ordered list of audio-track languages. This crate
//! exposes them through the [`MetadataExtractor`] trait with implementations
//! backed by the `mediainfo` and `ffprobe` command-line tools, plus a fixed
//! implementation for tests.
//!
//! ## Features
//!
//! - `tracing` - Log extractor fallbacks through `tracing`
//!
//! ## Example
//!
//! ```no_run
//! use reelhouse_av::{AutoExtractor, MetadataExtractor};
//! use std::path::Path;
//!
//! let extractor = AutoExtractor::default();
//! let attrs = extractor.extract(Path::new("/path/to/video.mkv"))?;
//! println!("{}x{} @ {} kbps", attrs.width, attrs.height, attrs.bitrate_kbps);
//! # Ok::<(), reelhouse_av::Error>(())
//! ```

mod error;
pub mod extract;
pub mod ffprobe;
pub mod mediainfo;
pub mod tools;

// Re-exports
pub use error::{Error, Result};
pub use extract::{
    AutoExtractor, FixedExtractor, MediaAttributes, MetadataExtractor, FALLBACK_BITRATE_KBPS,
    UNKNOWN_LANGUAGE,
};
pub use ffprobe::FfprobeExtractor;
pub use mediainfo::MediaInfoExtractor;
pub use tools::{check_tool, check_tools, require_tool, ToolInfo, ToolRole};
