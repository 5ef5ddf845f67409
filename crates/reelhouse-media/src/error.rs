//! Error types for reelhouse-media.

use thiserror::Error;

/// Result type for reelhouse-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reelhouse-media operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A resolution string was neither `WIDTHxHEIGHT` nor a known name.
    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),
}

impl Error {
    /// Create an invalid resolution error.
    pub fn invalid_resolution(value: impl Into<String>) -> Self {
        Self::InvalidResolution(value.into())
    }
}
