//! Database query modules.
//!
//! - folders: roots, the folder tree, scan locking and change markers
//! - media: media records and their change markers

pub mod folders;
pub mod media;

use reelhouse_common::{Error, Result};
use rusqlite::Connection;

/// Run `f` inside a SAVEPOINT, rolling back its writes if it fails.
///
/// Unlike `Connection::savepoint` this only needs a shared reference, so it
/// also works on a connection that already has an open transaction.
pub fn with_savepoint<T>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    conn.execute_batch("SAVEPOINT reelhouse_sp")
        .map_err(|e| Error::database(e.to_string()))?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch("RELEASE reelhouse_sp")
                .map_err(|e| Error::database(e.to_string()))?;
            Ok(value)
        }
        Err(err) => {
            let _ = conn.execute_batch("ROLLBACK TO reelhouse_sp; RELEASE reelhouse_sp");
            Err(err)
        }
    }
}

/// Build a `?,?,?` placeholder list for an `IN (...)` clause.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
