//! Reelhouse - media catalog scanner and HLS streaming server
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod scanner;
pub mod server;
pub mod streaming;
pub mod transcode;
