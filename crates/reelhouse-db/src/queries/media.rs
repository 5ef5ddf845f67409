//! Media query operations.

use reelhouse_common::{Error, FolderId, MediaId, Result, UserId};
use rusqlite::{params_from_iter, Connection};

use super::placeholders;
use crate::models::{Media, MediaMarker, NewMedia};

const MEDIA_COLUMNS: &str = "id, name, path, folder_id, root_folder_id, owner_id, duration_ms,
                             width, height, bitrate_kbps, audio_track_count, audio_languages,
                             last_modification";

fn parse_media_row(row: &rusqlite::Row) -> rusqlite::Result<Media> {
    let languages_json: String = row.get(11)?;

    Ok(Media {
        id: MediaId::from(row.get::<_, i64>(0)?),
        name: row.get(1)?,
        path: row.get(2)?,
        folder_id: FolderId::from(row.get::<_, i64>(3)?),
        root_folder_id: FolderId::from(row.get::<_, i64>(4)?),
        owner_id: UserId::from(row.get::<_, i64>(5)?),
        duration_ms: row.get(6)?,
        width: row.get(7)?,
        height: row.get(8)?,
        bitrate_kbps: row.get(9)?,
        audio_track_count: row.get(10)?,
        audio_languages: serde_json::from_str(&languages_json).unwrap_or_default(),
        last_modification: row.get(12)?,
    })
}

/// Insert a media record and return its ID.
pub fn create_media(conn: &Connection, media: &NewMedia) -> Result<MediaId> {
    let languages_json =
        serde_json::to_string(&media.audio_languages).map_err(|e| Error::internal(e.to_string()))?;

    conn.execute(
        "INSERT INTO media (
            name, path, folder_id, root_folder_id, owner_id, duration_ms, width, height,
            bitrate_kbps, audio_track_count, audio_languages, last_modification
        ) VALUES (
            :name, :path, :folder_id, :root_folder_id, :owner_id, :duration_ms, :width, :height,
            :bitrate_kbps, :audio_track_count, :audio_languages, :last_modification
        )",
        rusqlite::named_params! {
            ":name": &media.name,
            ":path": &media.path,
            ":folder_id": media.folder_id.get(),
            ":root_folder_id": media.root_folder_id.get(),
            ":owner_id": media.owner_id.get(),
            ":duration_ms": media.duration_ms,
            ":width": media.width,
            ":height": media.height,
            ":bitrate_kbps": media.bitrate_kbps,
            ":audio_track_count": media.audio_languages.len() as u32,
            ":audio_languages": languages_json,
            ":last_modification": media.last_modification,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(MediaId::from(conn.last_insert_rowid()))
}

/// Overwrite a media record with freshly extracted attributes.
///
/// The stored change marker never moves backwards.
pub fn update_media(conn: &Connection, id: MediaId, media: &NewMedia) -> Result<()> {
    let languages_json =
        serde_json::to_string(&media.audio_languages).map_err(|e| Error::internal(e.to_string()))?;

    let changed = conn
        .execute(
            "UPDATE media SET
                name = :name,
                folder_id = :folder_id,
                root_folder_id = :root_folder_id,
                duration_ms = :duration_ms,
                width = :width,
                height = :height,
                bitrate_kbps = :bitrate_kbps,
                audio_track_count = :audio_track_count,
                audio_languages = :audio_languages,
                last_modification = MAX(last_modification, :last_modification)
             WHERE id = :id",
            rusqlite::named_params! {
                ":name": &media.name,
                ":folder_id": media.folder_id.get(),
                ":root_folder_id": media.root_folder_id.get(),
                ":duration_ms": media.duration_ms,
                ":width": media.width,
                ":height": media.height,
                ":bitrate_kbps": media.bitrate_kbps,
                ":audio_track_count": media.audio_languages.len() as u32,
                ":audio_languages": languages_json,
                ":last_modification": media.last_modification,
                ":id": id.get(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if changed == 0 {
        return Err(Error::not_found(format!("media {}", id)));
    }

    Ok(())
}

/// Get a media record by ID.
pub fn get_media(conn: &Connection, id: MediaId) -> Result<Option<Media>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM media WHERE id = :id", MEDIA_COLUMNS),
        rusqlite::named_params! { ":id": id.get() },
        parse_media_row,
    );

    match result {
        Ok(media) => Ok(Some(media)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a media record by path within one owner's scope.
pub fn get_media_by_path(conn: &Connection, owner: UserId, path: &str) -> Result<Option<Media>> {
    let result = conn.query_row(
        &format!(
            "SELECT {} FROM media WHERE owner_id = :owner AND path = :path",
            MEDIA_COLUMNS
        ),
        rusqlite::named_params! { ":owner": owner.get(), ":path": path },
        parse_media_row,
    );

    match result {
        Ok(media) => Ok(Some(media)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List the media directly inside a folder, ordered by path.
pub fn list_media_in_folder(conn: &Connection, folder_id: FolderId) -> Result<Vec<Media>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM media WHERE folder_id = ? ORDER BY path",
            MEDIA_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let media = stmt
        .query_map([folder_id.get()], parse_media_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(media)
}

/// Read the change markers of every media record owned by `owner`.
pub fn list_media_markers(conn: &Connection, owner: UserId) -> Result<Vec<MediaMarker>> {
    let mut stmt = conn
        .prepare("SELECT id, path, last_modification FROM media WHERE owner_id = ?")
        .map_err(|e| Error::database(e.to_string()))?;

    let markers = stmt
        .query_map([owner.get()], |row| {
            Ok(MediaMarker {
                id: MediaId::from(row.get::<_, i64>(0)?),
                path: row.get(1)?,
                last_modification: row.get(2)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(markers)
}

/// Delete media records by ID. Returns the number of rows removed.
pub fn delete_media(conn: &Connection, ids: &[MediaId]) -> Result<usize> {
    let mut removed = 0;
    // Stay well under SQLite's bound-parameter limit.
    for chunk in ids.chunks(500) {
        let sql = format!("DELETE FROM media WHERE id IN ({})", placeholders(chunk.len()));
        removed += conn
            .execute(&sql, params_from_iter(chunk.iter().map(|id| id.get())))
            .map_err(|e| Error::database(e.to_string()))?;
    }
    Ok(removed)
}

/// Count all media owned by `owner`.
pub fn count_media(conn: &Connection, owner: UserId) -> Result<usize> {
    conn.query_row(
        "SELECT COUNT(*) FROM media WHERE owner_id = ?",
        [owner.get()],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as usize)
    .map_err(|e| Error::database(e.to_string()))
}
