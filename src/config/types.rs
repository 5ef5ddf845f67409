use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use reelhouse_common::paths::DEFAULT_VIDEO_EXTENSIONS;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default = "default_formats")]
    pub formats: Vec<FormatConfig>,

    #[serde(default = "default_transcoders")]
    pub transcoders: Vec<TranscoderConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix for segment URIs written into manifests. Empty means
    /// host-relative URIs.
    #[serde(default)]
    pub base_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file; `~` is expanded.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("reelhouse.sqlite")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Roots registered at server startup when missing.
    #[serde(default)]
    pub roots: Vec<RootConfig>,

    /// File extensions indexed by the scanner, without the leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RootConfig {
    pub path: PathBuf,

    #[serde(default = "default_owner")]
    pub owner: i64,

    #[serde(default)]
    pub exclude_autoscan: bool,
}

fn default_owner() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Files processed between commits.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Rescan every autoscan root at this interval. Unset disables the
    /// scheduler.
    #[serde(default)]
    pub schedule_interval_secs: Option<u64>,

    /// Skip every file inside a directory whose mtime matches its marker.
    /// Faster, but misses files modified in place.
    #[serde(default)]
    pub trust_directory_mtime: bool,

    /// Release locks left behind by a crashed process when the server starts.
    #[serde(default)]
    pub clear_locks_on_startup: bool,

    /// How long a finished background scan stays visible under `/scans`.
    #[serde(default = "default_job_retention_secs")]
    pub job_retention_secs: u64,
}

fn default_batch_size() -> usize {
    100
}

fn default_job_retention_secs() -> u64 {
    crate::scanner::DEFAULT_JOB_RETENTION_SECS
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            schedule_interval_secs: None,
            trust_directory_mtime: false,
            clear_locks_on_startup: false,
            job_retention_secs: default_job_retention_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub mediainfo_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

/// A container format known to the server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FormatConfig {
    pub name: String,

    pub mime_type: String,

    /// Clients can play this format without transcoding.
    #[serde(default)]
    pub native: bool,
}

impl FormatConfig {
    fn new(name: &str, mime_type: &str, native: bool) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            native,
        }
    }
}

fn default_formats() -> Vec<FormatConfig> {
    vec![
        FormatConfig::new("mp4", "video/mp4", true),
        FormatConfig::new("webm", "video/webm", true),
        FormatConfig::new("mkv", "video/x-matroska", false),
        FormatConfig::new("avi", "video/x-msvideo", false),
        FormatConfig::new("mov", "video/quicktime", false),
        FormatConfig::new("m4v", "video/x-m4v", false),
        FormatConfig::new("mpg", "video/mpeg", false),
        FormatConfig::new("ts", "video/mp2t", false),
    ]
}

/// An external command that turns one segment of a media file into bytes on
/// stdout.
///
/// `command` is split on whitespace into arguments before the tokens `%i`
/// (input path), `%s` (seek as `H:MM:SS`), `%d` (duration seconds), `%b`
/// (bitrate kbps), `%r` (`WIDTHxHEIGHT`) and `%l` (audio track) are replaced.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscoderConfig {
    pub name: String,

    /// Lower values are preferred.
    #[serde(default = "default_sequence")]
    pub sequence: i32,

    pub command: String,

    /// Bitrate used when a segment request does not name one.
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    #[serde(default)]
    pub input_formats: Vec<String>,

    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Read buffer for the process output, in KB.
    #[serde(default = "default_buffer_size")]
    pub buffer_size_kb: usize,
}

fn default_sequence() -> i32 {
    10
}
fn default_bitrate() -> u32 {
    1500
}
fn default_output_format() -> String {
    "ts".to_string()
}
fn default_buffer_size() -> usize {
    1000
}

fn default_transcoders() -> Vec<TranscoderConfig> {
    vec![TranscoderConfig {
        name: "ffmpeg-mpegts".to_string(),
        sequence: default_sequence(),
        command: "ffmpeg -v quiet -ss %s -i %i -t %d -map 0:0 -map 0:%l \
                  -c:v libx264 -preset veryfast -b:v %bk -s %r \
                  -c:a aac -b:a 128k -ac 2 -f mpegts pipe:1"
            .to_string(),
        bitrate: default_bitrate(),
        input_formats: ["avi", "m4v", "mkv", "mov", "mp4", "mpg", "webm"]
            .iter()
            .map(|f| f.to_string())
            .collect(),
        output_format: default_output_format(),
        buffer_size_kb: default_buffer_size(),
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            library: LibraryConfig::default(),
            scan: ScanConfig::default(),
            tools: ToolsConfig::default(),
            formats: default_formats(),
            transcoders: default_transcoders(),
        }
    }
}

impl Config {
    /// Look up a format by name.
    pub fn format(&self, name: &str) -> Option<&FormatConfig> {
        self.formats.iter().find(|f| f.name == name)
    }
}
