use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelhouse")]
#[command(author, version, about = "Media catalog scanner and HLS streaming server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server and scan scheduler
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Register a directory as a scan root
    AddRoot {
        /// Directory to register
        #[arg(required = true)]
        path: PathBuf,

        /// Owning user ID
        #[arg(long, default_value = "1")]
        owner: i64,

        /// Leave this root out of scheduled rescans
        #[arg(long)]
        no_autoscan: bool,
    },

    /// Scan one folder and wait for it to finish
    Scan {
        /// Folder ID to scan
        folder_id: i64,

        /// Re-extract every file instead of only changed ones
        #[arg(long)]
        full: bool,
    },

    /// Scan every root not excluded from autoscan
    ScanAll,

    /// Release a stale scan lock left by a crashed scan
    Unlock {
        /// Folder ID to unlock
        folder_id: i64,
    },

    /// Extract and display the attributes the catalog stores for a file
    Inspect {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
