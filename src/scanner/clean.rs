//! Removal of catalog rows whose files or directories are gone.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use reelhouse_common::{paths::has_allowed_extension, FolderId, MediaId, UserId};
use reelhouse_db::{
    models::Folder,
    queries::{folders, media},
};
use rusqlite::Connection;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Rows deleted by a cleaning pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cleaned {
    pub folders: usize,
    pub media: usize,
}

/// What currently exists on disk below a directory.
#[derive(Debug, Default)]
struct DiskListing {
    dirs: HashSet<PathBuf>,
    files: HashSet<PathBuf>,
    /// Directories that could not be read. Rows below them are kept.
    unreadable: Vec<PathBuf>,
}

impl DiskListing {
    fn read(target: &Path, extensions: &[String]) -> Self {
        let mut listing = Self::default();

        for entry in WalkDir::new(target).follow_links(false) {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    listing.dirs.insert(entry.into_path());
                }
                Ok(entry) if entry.file_type().is_file() => {
                    if has_allowed_extension(entry.path(), extensions) {
                        listing.files.insert(entry.into_path());
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Unreadable entry while cleaning");
                    if let Some(path) = e.path() {
                        listing.unreadable.push(path.to_path_buf());
                    }
                }
            }
        }

        listing
    }

    fn shielded(&self, path: &Path) -> bool {
        self.unreadable.iter().any(|u| path.starts_with(u))
    }
}

/// Delete every catalog row of `owner` under `target` that no longer exists
/// on disk. Folder deletes cascade to their descendants.
pub fn remove_missing(
    conn: &Connection,
    target: &Path,
    owner: UserId,
    extensions: &[String],
) -> Result<Cleaned> {
    let listing = DiskListing::read(target, extensions);

    let missing_folders: Vec<FolderId> = folders::list_folder_markers(conn, owner)?
        .into_iter()
        .filter(|m| {
            let path = Path::new(&m.path);
            path.starts_with(target) && !listing.dirs.contains(path) && !listing.shielded(path)
        })
        .map(|m| m.id)
        .collect();

    let missing_media: Vec<MediaId> = media::list_media_markers(conn, owner)?
        .into_iter()
        .filter(|m| {
            let path = Path::new(&m.path);
            path.starts_with(target) && !listing.files.contains(path) && !listing.shielded(path)
        })
        .map(|m| m.id)
        .collect();

    let mut cleaned = Cleaned::default();

    if !missing_folders.is_empty() {
        let removed = folders::delete_folders(conn, &missing_folders)?;
        cleaned.folders = removed.folders;
        cleaned.media = removed.media;
    }

    // Media under a deleted folder are already gone and count zero here
    if !missing_media.is_empty() {
        cleaned.media += media::delete_media(conn, &missing_media)?;
    }

    if cleaned != Cleaned::default() {
        debug!(
            target = %target.display(),
            folders = cleaned.folders,
            media = cleaned.media,
            "Removed missing catalog entries"
        );
    }

    Ok(cleaned)
}

/// Delete a folder whose directory is gone, with everything catalogued
/// below it.
pub fn remove_vanished(conn: &Connection, folder: &Folder) -> Result<Cleaned> {
    let removed = folders::delete_folders(conn, &[folder.id])?;
    warn!(
        folder_id = %folder.id,
        path = %folder.path,
        folders = removed.folders,
        media = removed.media,
        "Removed vanished folder from the catalog"
    );

    Ok(Cleaned {
        folders: removed.folders,
        media: removed.media,
    })
}
