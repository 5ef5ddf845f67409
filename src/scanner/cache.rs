//! Per-scan snapshot of catalog markers.

use std::collections::HashMap;

use anyhow::Result;
use reelhouse_common::{FolderId, MediaId, UserId};
use reelhouse_db::queries::{folders, media};
use rusqlite::Connection;

/// Catalog state for one owner, read once when a scan starts.
///
/// Lookups are by stored path. Folders created during the walk are added so
/// their children can resolve a parent; nothing is ever re-read.
#[derive(Debug)]
pub struct ScanCache {
    owner: UserId,
    folders: HashMap<String, (FolderId, i64)>,
    media: HashMap<String, (MediaId, i64)>,
}

impl ScanCache {
    /// Read every folder and media marker belonging to `owner`.
    pub fn load(conn: &Connection, owner: UserId) -> Result<Self> {
        let folders = folders::list_folder_markers(conn, owner)?
            .into_iter()
            .map(|m| (m.path, (m.id, m.last_modification)))
            .collect();

        let media = media::list_media_markers(conn, owner)?
            .into_iter()
            .map(|m| (m.path, (m.id, m.last_modification)))
            .collect();

        Ok(Self {
            owner,
            folders,
            media,
        })
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn folder(&self, path: &str) -> Option<(FolderId, i64)> {
        self.folders.get(path).copied()
    }

    pub fn media(&self, path: &str) -> Option<(MediaId, i64)> {
        self.media.get(path).copied()
    }

    pub fn insert_folder(&mut self, path: String, id: FolderId, marker: i64) {
        self.folders.insert(path, (id, marker));
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn media_count(&self) -> usize {
        self.media.len()
    }
}
