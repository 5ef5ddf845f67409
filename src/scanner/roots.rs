//! Root folder registration and lock maintenance.

use std::path::Path;

use anyhow::{Context, Result};
use reelhouse_common::{FolderId, UserId};
use reelhouse_db::{models::Folder, queries::folders};
use rusqlite::Connection;

use crate::config::RootConfig;

/// Register a directory as a scan root.
///
/// The directory must exist. Registering an existing root returns it
/// unchanged.
pub fn add_root(
    conn: &Connection,
    path: &Path,
    owner: UserId,
    exclude_autoscan: bool,
) -> Result<Folder> {
    if !path.is_dir() {
        anyhow::bail!("Not a directory: {:?}", path);
    }

    let folder = folders::create_root_folder(conn, path, owner, exclude_autoscan)
        .with_context(|| format!("Failed to register root {:?}", path))?;

    tracing::info!(folder_id = %folder.id, path = %folder.path, owner = %owner, "Registered root folder");
    Ok(folder)
}

/// Register roots listed in configuration. Roots that cannot be registered
/// are logged and skipped. Returns the registered folders.
pub fn register_configured_roots(conn: &Connection, roots: &[RootConfig]) -> Vec<Folder> {
    roots
        .iter()
        .filter_map(|root| {
            match add_root(conn, &root.path, UserId::from(root.owner), root.exclude_autoscan) {
                Ok(folder) => Some(folder),
                Err(e) => {
                    tracing::warn!(path = ?root.path, error = %e, "Skipping configured root");
                    None
                }
            }
        })
        .collect()
}

/// Clear a stale scan lock. Returns `false` if the folder does not exist.
pub fn unlock(conn: &Connection, folder_id: FolderId) -> Result<bool> {
    let found = folders::unlock_folder(conn, folder_id)?;
    if found {
        tracing::info!(folder_id = %folder_id, "Released scan lock");
    }
    Ok(found)
}
