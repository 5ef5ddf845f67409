//! Folder query operations.
//!
//! Covers root registration, the folder tree, the durable scan lock and the
//! change markers the scanner compares against.
//!
//! The `locked` column is a cross-process advisory lock. It is taken with a
//! single compare-and-set UPDATE, so callers must run [`try_lock_folder`]
//! outside any open transaction for the flag to be visible to other
//! connections as soon as it returns.

use std::path::Path;

use chrono::{DateTime, Utc};
use reelhouse_common::paths::normalize_path;
use reelhouse_common::{Error, FolderId, Result, UserId};
use rusqlite::Connection;

use super::with_savepoint;
use crate::models::{Folder, FolderMarker, LockAttempt, Removed};

/// Selects the folder `?1` and all of its descendants as `subtree(id)`.
const SUBTREE: &str = "WITH RECURSIVE subtree(id) AS (
        SELECT id FROM folders WHERE id = ?1
        UNION ALL
        SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
    )";

const FOLDER_COLUMNS: &str = "id, path, root, parent_id, owner_id, last_modification, locked,
                              exclude_autoscan, last_scan, last_scan_duration_ms";

fn parse_folder_row(row: &rusqlite::Row) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: FolderId::from(row.get::<_, i64>(0)?),
        path: row.get(1)?,
        root: row.get::<_, i32>(2)? != 0,
        parent_id: row.get::<_, Option<i64>>(3)?.map(FolderId::from),
        owner_id: UserId::from(row.get::<_, i64>(4)?),
        last_modification: row.get(5)?,
        locked: row.get::<_, i32>(6)? != 0,
        exclude_autoscan: row.get::<_, i32>(7)? != 0,
        last_scan: row
            .get::<_, Option<String>>(8)?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        last_scan_duration_ms: row.get(9)?,
    })
}

/// Register a root folder for `owner`.
///
/// The path must be absolute and is normalised before storage. Registering
/// an existing root again returns the stored row unchanged; a path already
/// catalogued as a subfolder is rejected.
pub fn create_root_folder(
    conn: &Connection,
    path: &Path,
    owner: UserId,
    exclude_autoscan: bool,
) -> Result<Folder> {
    if !path.is_absolute() {
        return Err(Error::invalid_input(format!(
            "root path must be absolute: {}",
            path.display()
        )));
    }
    let path = normalize_path(path).to_string_lossy().into_owned();

    if let Some(existing) = get_folder_by_path(conn, owner, &path)? {
        if existing.root {
            return Ok(existing);
        }
        return Err(Error::invalid_input(format!(
            "{} is already catalogued below root folder",
            path
        )));
    }

    conn.execute(
        "INSERT INTO folders (path, root, parent_id, owner_id, last_modification, exclude_autoscan)
         VALUES (:path, 1, NULL, :owner, 0, :exclude)",
        rusqlite::named_params! {
            ":path": &path,
            ":owner": owner.get(),
            ":exclude": exclude_autoscan as i32,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    let id = FolderId::from(conn.last_insert_rowid());
    get_folder(conn, id)?.ok_or_else(|| Error::internal("inserted root folder vanished"))
}

/// Insert a non-root folder and return its ID.
pub fn create_folder(
    conn: &Connection,
    path: &str,
    parent_id: FolderId,
    owner: UserId,
    last_modification: i64,
) -> Result<FolderId> {
    conn.execute(
        "INSERT INTO folders (path, root, parent_id, owner_id, last_modification)
         VALUES (:path, 0, :parent, :owner, :marker)",
        rusqlite::named_params! {
            ":path": path,
            ":parent": parent_id.get(),
            ":owner": owner.get(),
            ":marker": last_modification,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(FolderId::from(conn.last_insert_rowid()))
}

/// Get a folder by ID.
pub fn get_folder(conn: &Connection, id: FolderId) -> Result<Option<Folder>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM folders WHERE id = :id", FOLDER_COLUMNS),
        rusqlite::named_params! { ":id": id.get() },
        parse_folder_row,
    );

    match result {
        Ok(folder) => Ok(Some(folder)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a folder by its path within one owner's scope.
pub fn get_folder_by_path(conn: &Connection, owner: UserId, path: &str) -> Result<Option<Folder>> {
    let result = conn.query_row(
        &format!(
            "SELECT {} FROM folders WHERE owner_id = :owner AND path = :path",
            FOLDER_COLUMNS
        ),
        rusqlite::named_params! { ":owner": owner.get(), ":path": path },
        parse_folder_row,
    );

    match result {
        Ok(folder) => Ok(Some(folder)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

fn query_folders(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Folder>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| Error::database(e.to_string()))?;

    let folders = stmt
        .query_map(params, parse_folder_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(folders)
}

/// List the direct children of a folder, ordered by path.
pub fn list_child_folders(conn: &Connection, parent_id: FolderId) -> Result<Vec<Folder>> {
    query_folders(
        conn,
        &format!(
            "SELECT {} FROM folders WHERE parent_id = ? ORDER BY path",
            FOLDER_COLUMNS
        ),
        [parent_id.get()],
    )
}

/// List every root folder, ordered by ID.
pub fn list_root_folders(conn: &Connection) -> Result<Vec<Folder>> {
    query_folders(
        conn,
        &format!("SELECT {} FROM folders WHERE root = 1 ORDER BY id", FOLDER_COLUMNS),
        [],
    )
}

/// List root folders taking part in the scheduled rescan.
pub fn list_autoscan_roots(conn: &Connection) -> Result<Vec<Folder>> {
    query_folders(
        conn,
        &format!(
            "SELECT {} FROM folders WHERE root = 1 AND exclude_autoscan = 0 ORDER BY id",
            FOLDER_COLUMNS
        ),
        [],
    )
}

/// Resolve the root folder a folder belongs to.
pub fn find_root(conn: &Connection, id: FolderId) -> Result<Option<FolderId>> {
    let result = conn.query_row(
        "WITH RECURSIVE ancestors(id, parent_id, root) AS (
             SELECT id, parent_id, root FROM folders WHERE id = ?1
             UNION ALL
             SELECT f.id, f.parent_id, f.root FROM folders f
             JOIN ancestors a ON f.id = a.parent_id
         )
         SELECT id FROM ancestors WHERE root = 1 LIMIT 1",
        [id.get()],
        |row| row.get::<_, i64>(0),
    );

    match result {
        Ok(root) => Ok(Some(FolderId::from(root))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Read the change markers of every folder owned by `owner`.
pub fn list_folder_markers(conn: &Connection, owner: UserId) -> Result<Vec<FolderMarker>> {
    let mut stmt = conn
        .prepare("SELECT id, path, root, last_modification FROM folders WHERE owner_id = ?")
        .map_err(|e| Error::database(e.to_string()))?;

    let markers = stmt
        .query_map([owner.get()], |row| {
            Ok(FolderMarker {
                id: FolderId::from(row.get::<_, i64>(0)?),
                path: row.get(1)?,
                root: row.get::<_, i32>(2)? != 0,
                last_modification: row.get(3)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(markers)
}

/// Store a new change marker and re-associate the folder with `parent_id`.
///
/// Roots always keep a NULL parent, whatever `parent_id` says.
pub fn update_folder_marker(
    conn: &Connection,
    id: FolderId,
    last_modification: i64,
    parent_id: Option<FolderId>,
) -> Result<()> {
    conn.execute(
        "UPDATE folders
         SET last_modification = :marker,
             parent_id = CASE WHEN root = 1 THEN NULL ELSE :parent END
         WHERE id = :id",
        rusqlite::named_params! {
            ":marker": last_modification,
            ":parent": parent_id.map(FolderId::get),
            ":id": id.get(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Delete folders together with all descendant folders and their media.
pub fn delete_folders(conn: &Connection, ids: &[FolderId]) -> Result<Removed> {
    with_savepoint(conn, |conn| {
        let mut removed = Removed::default();
        for id in ids {
            removed.media += conn
                .execute(
                    &format!(
                        "{} DELETE FROM media
                         WHERE folder_id IN (SELECT id FROM subtree)
                            OR root_folder_id IN (SELECT id FROM subtree)",
                        SUBTREE
                    ),
                    [id.get()],
                )
                .map_err(|e| Error::database(e.to_string()))?;

            removed.folders += conn
                .execute(
                    &format!(
                        "{} DELETE FROM folders WHERE id IN (SELECT id FROM subtree)",
                        SUBTREE
                    ),
                    [id.get()],
                )
                .map_err(|e| Error::database(e.to_string()))?;
        }
        Ok(removed)
    })
}

/// Try to take the scan lock on a folder.
pub fn try_lock_folder(conn: &Connection, id: FolderId) -> Result<LockAttempt> {
    let changed = conn
        .execute(
            "UPDATE folders SET locked = 1 WHERE id = ? AND locked = 0",
            [id.get()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if changed == 1 {
        return Ok(LockAttempt::Acquired);
    }

    match get_folder(conn, id)? {
        Some(_) => Ok(LockAttempt::AlreadyLocked),
        None => Ok(LockAttempt::NotFound),
    }
}

/// Record scan completion and release the lock.
///
/// Returns `false` when the folder no longer exists.
pub fn finish_scan(conn: &Connection, id: FolderId, duration_ms: i64) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE folders
             SET locked = 0, last_scan = :now, last_scan_duration_ms = :duration
             WHERE id = :id",
            rusqlite::named_params! {
                ":now": Utc::now().to_rfc3339(),
                ":duration": duration_ms,
                ":id": id.get(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(changed > 0)
}

/// Release the lock without recording a scan. Returns `false` if the folder
/// does not exist.
pub fn unlock_folder(conn: &Connection, id: FolderId) -> Result<bool> {
    let changed = conn
        .execute("UPDATE folders SET locked = 0 WHERE id = ?", [id.get()])
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(changed > 0)
}

/// Release every held lock. Returns how many folders were locked.
pub fn clear_all_locks(conn: &Connection) -> Result<usize> {
    conn.execute("UPDATE folders SET locked = 0 WHERE locked = 1", [])
        .map_err(|e| Error::database(e.to_string()))
}

/// Reset the change markers of a folder, its descendants and all media
/// below them to zero. Returns `(folders, media)` rows reset.
pub fn reset_subtree_markers(conn: &Connection, id: FolderId) -> Result<(usize, usize)> {
    with_savepoint(conn, |conn| {
        let folders = conn
            .execute(
                &format!(
                    "{} UPDATE folders SET last_modification = 0
                     WHERE id IN (SELECT id FROM subtree)",
                    SUBTREE
                ),
                [id.get()],
            )
            .map_err(|e| Error::database(e.to_string()))?;

        let media = conn
            .execute(
                &format!(
                    "{} UPDATE media SET last_modification = 0
                     WHERE folder_id IN (SELECT id FROM subtree)",
                    SUBTREE
                ),
                [id.get()],
            )
            .map_err(|e| Error::database(e.to_string()))?;

        Ok((folders, media))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMedia;
    use crate::pool::init_memory_pool;
    use crate::queries::media::{create_media, get_media};

    fn owner() -> UserId {
        UserId::from(1)
    }

    fn new_media(path: &str, folder_id: FolderId, root_folder_id: FolderId) -> NewMedia {
        NewMedia {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            folder_id,
            root_folder_id,
            owner_id: owner(),
            duration_ms: 60_000,
            width: 1920,
            height: 1080,
            bitrate_kbps: 4000,
            audio_languages: vec!["eng".to_string()],
            last_modification: 1_700_000_000,
        }
    }

    #[test]
    fn test_create_root_folder_normalises_path() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let root = create_root_folder(&conn, Path::new("/srv//videos/./"), owner(), false).unwrap();

        assert_eq!(root.path, "/srv/videos");
        assert!(root.root);
        assert!(root.parent_id.is_none());
        assert_eq!(root.last_modification, 0);
        assert!(!root.locked);
    }

    #[test]
    fn test_create_root_folder_is_idempotent() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let first = create_root_folder(&conn, Path::new("/srv/videos"), owner(), false).unwrap();
        let second = create_root_folder(&conn, Path::new("/srv/videos/"), owner(), true).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(list_root_folders(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_create_root_folder_rejects_relative_path() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let result = create_root_folder(&conn, Path::new("videos"), owner(), false);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_same_path_for_different_owners() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let a = create_root_folder(&conn, Path::new("/srv/videos"), UserId::from(1), false).unwrap();
        let b = create_root_folder(&conn, Path::new("/srv/videos"), UserId::from(2), false).unwrap();

        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_child_folders_and_find_root() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let root = create_root_folder(&conn, Path::new("/srv/videos"), owner(), false).unwrap();
        let films = create_folder(&conn, "/srv/videos/films", root.id, owner(), 10).unwrap();
        let noir = create_folder(&conn, "/srv/videos/films/noir", films, owner(), 20).unwrap();

        let children = list_child_folders(&conn, root.id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, films);
        assert_eq!(children[0].parent_id, Some(root.id));

        assert_eq!(find_root(&conn, noir).unwrap(), Some(root.id));
        assert_eq!(find_root(&conn, root.id).unwrap(), Some(root.id));
        assert_eq!(find_root(&conn, FolderId::from(999)).unwrap(), None);
    }

    #[test]
    fn test_list_autoscan_roots_skips_excluded() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let included = create_root_folder(&conn, Path::new("/a"), owner(), false).unwrap();
        create_root_folder(&conn, Path::new("/b"), owner(), true).unwrap();

        let roots = list_autoscan_roots(&conn).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, included.id);
    }

    #[test]
    fn test_folder_markers_scoped_to_owner() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let root = create_root_folder(&conn, Path::new("/a"), UserId::from(1), false).unwrap();
        create_folder(&conn, "/a/b", root.id, UserId::from(1), 42).unwrap();
        create_root_folder(&conn, Path::new("/other"), UserId::from(2), false).unwrap();

        let markers = list_folder_markers(&conn, UserId::from(1)).unwrap();
        assert_eq!(markers.len(), 2);
        let child = markers.iter().find(|m| m.path == "/a/b").unwrap();
        assert_eq!(child.last_modification, 42);
        assert!(!child.root);
    }

    #[test]
    fn test_update_folder_marker_keeps_root_parent_null() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let root = create_root_folder(&conn, Path::new("/a"), owner(), false).unwrap();
        let other = create_root_folder(&conn, Path::new("/z"), owner(), false).unwrap();
        let child = create_folder(&conn, "/a/b", root.id, owner(), 1).unwrap();

        update_folder_marker(&conn, root.id, 100, Some(other.id)).unwrap();
        update_folder_marker(&conn, child, 200, Some(root.id)).unwrap();

        let root = get_folder(&conn, root.id).unwrap().unwrap();
        assert_eq!(root.last_modification, 100);
        assert!(root.parent_id.is_none());

        let child = get_folder(&conn, child).unwrap().unwrap();
        assert_eq!(child.last_modification, 200);
        assert_eq!(child.parent_id, Some(root.id));
    }

    #[test]
    fn test_lock_is_exclusive() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let root = create_root_folder(&conn, Path::new("/a"), owner(), false).unwrap();

        assert_eq!(try_lock_folder(&conn, root.id).unwrap(), LockAttempt::Acquired);
        assert_eq!(
            try_lock_folder(&conn, root.id).unwrap(),
            LockAttempt::AlreadyLocked
        );
        assert_eq!(
            try_lock_folder(&conn, FolderId::from(404)).unwrap(),
            LockAttempt::NotFound
        );

        assert!(finish_scan(&conn, root.id, 1234).unwrap());
        let root = get_folder(&conn, root.id).unwrap().unwrap();
        assert!(!root.locked);
        assert!(root.last_scan.is_some());
        assert_eq!(root.last_scan_duration_ms, Some(1234));

        assert_eq!(try_lock_folder(&conn, root.id).unwrap(), LockAttempt::Acquired);
    }

    #[test]
    fn test_lock_visible_to_other_connections() {
        let pool = init_memory_pool().unwrap();
        let first = pool.get().unwrap();
        let second = pool.get().unwrap();
        let root = create_root_folder(&first, Path::new("/a"), owner(), false).unwrap();

        assert_eq!(try_lock_folder(&first, root.id).unwrap(), LockAttempt::Acquired);
        assert_eq!(
            try_lock_folder(&second, root.id).unwrap(),
            LockAttempt::AlreadyLocked
        );
    }

    #[test]
    fn test_unlock_and_clear_all_locks() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let a = create_root_folder(&conn, Path::new("/a"), owner(), false).unwrap();
        let b = create_root_folder(&conn, Path::new("/b"), owner(), false).unwrap();

        try_lock_folder(&conn, a.id).unwrap();
        try_lock_folder(&conn, b.id).unwrap();

        assert!(unlock_folder(&conn, a.id).unwrap());
        assert!(!unlock_folder(&conn, FolderId::from(404)).unwrap());
        assert_eq!(clear_all_locks(&conn).unwrap(), 1);
        assert!(!get_folder(&conn, b.id).unwrap().unwrap().locked);
    }

    #[test]
    fn test_delete_folders_cascades() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let root = create_root_folder(&conn, Path::new("/a"), owner(), false).unwrap();
        let keep = create_folder(&conn, "/a/keep", root.id, owner(), 1).unwrap();
        let gone = create_folder(&conn, "/a/gone", root.id, owner(), 1).unwrap();
        let deeper = create_folder(&conn, "/a/gone/deeper", gone, owner(), 1).unwrap();

        let kept_media = create_media(&conn, &new_media("/a/keep/x.mkv", keep, root.id)).unwrap();
        create_media(&conn, &new_media("/a/gone/y.mkv", gone, root.id)).unwrap();
        create_media(&conn, &new_media("/a/gone/deeper/z.mkv", deeper, root.id)).unwrap();

        let removed = delete_folders(&conn, &[gone]).unwrap();
        assert_eq!(removed, Removed { folders: 2, media: 2 });

        assert!(get_folder(&conn, root.id).unwrap().is_some());
        assert!(get_folder(&conn, keep).unwrap().is_some());
        assert!(get_folder(&conn, gone).unwrap().is_none());
        assert!(get_folder(&conn, deeper).unwrap().is_none());
        assert!(get_media(&conn, kept_media).unwrap().is_some());
    }

    #[test]
    fn test_delete_root_removes_everything_below() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let root = create_root_folder(&conn, Path::new("/a"), owner(), false).unwrap();
        let child = create_folder(&conn, "/a/b", root.id, owner(), 1).unwrap();
        create_media(&conn, &new_media("/a/b/x.mkv", child, root.id)).unwrap();
        create_media(&conn, &new_media("/a/y.mkv", root.id, root.id)).unwrap();

        let removed = delete_folders(&conn, &[root.id]).unwrap();
        assert_eq!(removed, Removed { folders: 2, media: 2 });
        assert!(list_root_folders(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_reset_subtree_markers() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let root = create_root_folder(&conn, Path::new("/a"), owner(), false).unwrap();
        update_folder_marker(&conn, root.id, 50, None).unwrap();
        let child = create_folder(&conn, "/a/b", root.id, owner(), 60).unwrap();
        let sibling_root = create_root_folder(&conn, Path::new("/z"), owner(), false).unwrap();
        update_folder_marker(&conn, sibling_root.id, 70, None).unwrap();
        let media = create_media(&conn, &new_media("/a/b/x.mkv", child, root.id)).unwrap();

        let (folders, media_rows) = reset_subtree_markers(&conn, root.id).unwrap();
        assert_eq!((folders, media_rows), (2, 1));

        assert_eq!(get_folder(&conn, child).unwrap().unwrap().last_modification, 0);
        assert_eq!(get_media(&conn, media).unwrap().unwrap().last_modification, 0);
        assert_eq!(
            get_folder(&conn, sibling_root.id).unwrap().unwrap().last_modification,
            70
        );
    }
}
