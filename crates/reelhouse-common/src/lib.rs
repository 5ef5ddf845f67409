//! Reelhouse-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across reelhouse:
//!
//! - **Typed IDs**: newtype wrappers for catalog row IDs, owners, and scan jobs
//! - **Path Utilities**: video extension filtering and path normalisation
//! - **Error Handling**: common error type and result alias
//!
//! # Examples
//!
//! ```
//! use reelhouse_common::{FolderId, Error, Result};
//! use reelhouse_common::paths::is_video_file;
//! use std::path::Path;
//!
//! let folder_id = FolderId::from(7);
//! assert_eq!(folder_id.get(), 7);
//!
//! assert!(is_video_file(Path::new("movie.mkv")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("folder"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::*;
