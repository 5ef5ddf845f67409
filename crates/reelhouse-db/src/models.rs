//! Rust models matching the `folders` and `media` tables.

use chrono::{DateTime, Utc};
use reelhouse_common::{FolderId, MediaId, UserId};
use serde::{Deserialize, Serialize};

/// A catalog folder. Roots have no parent; every other folder's ancestor
/// chain ends at a root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub id: FolderId,
    pub path: String,
    pub root: bool,
    pub parent_id: Option<FolderId>,
    pub owner_id: UserId,
    /// Filesystem mtime in whole seconds at the last scan that wrote this row.
    pub last_modification: i64,
    pub locked: bool,
    pub exclude_autoscan: bool,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_scan_duration_ms: Option<i64>,
}

/// A catalog media record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Media {
    pub id: MediaId,
    pub name: String,
    pub path: String,
    pub folder_id: FolderId,
    pub root_folder_id: FolderId,
    pub owner_id: UserId,
    pub duration_ms: i64,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    pub audio_track_count: u32,
    pub audio_languages: Vec<String>,
    pub last_modification: i64,
}

/// Column values written by a media insert or update.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMedia {
    pub name: String,
    pub path: String,
    pub folder_id: FolderId,
    pub root_folder_id: FolderId,
    pub owner_id: UserId,
    pub duration_ms: i64,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    pub audio_languages: Vec<String>,
    pub last_modification: i64,
}

/// The slice of a folder row the scanner caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMarker {
    pub id: FolderId,
    pub path: String,
    pub root: bool,
    pub last_modification: i64,
}

/// The slice of a media row the scanner caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMarker {
    pub id: MediaId,
    pub path: String,
    pub last_modification: i64,
}

/// Result of trying to take the scan lock on a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAttempt {
    Acquired,
    AlreadyLocked,
    NotFound,
}

/// Rows removed by a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removed {
    pub folders: usize,
    pub media: usize,
}
