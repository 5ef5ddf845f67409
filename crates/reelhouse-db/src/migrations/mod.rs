//! Catalog schema migrations.
//!
//! The folder and media tables are created by versioned SQL scripts embedded
//! in the binary. Each script runs once, in version order, and is recorded in
//! `schema_migrations` so reopening a catalog only applies what is new.

use rusqlite::Connection;
use thiserror::Error;

/// Migration error types
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration {version} ({name}) failed: {message}")]
    Failed {
        version: u32,
        name: &'static str,
        message: String,
    },

    /// The catalog was written by a newer build than this one.
    #[error("Catalog schema version {found} is newer than supported version {supported}")]
    NewerSchema { found: u32, supported: u32 },
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

impl Migration {
    fn failed(&self, e: rusqlite::Error) -> MigrationError {
        MigrationError::Failed {
            version: self.version,
            name: self.name,
            message: e.to_string(),
        }
    }
}

/// Embedded catalog scripts, oldest first.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "folders_and_media",
    sql: include_str!("001_initial.sql"),
}];

fn init_migrations_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;
    Ok(())
}

/// Highest recorded version, 0 for a fresh catalog.
fn catalog_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
        row.get::<_, Option<u32>>(0)
    })
    .map(|version| version.unwrap_or(0))
}

/// Version of the newest embedded script.
fn supported_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<(), MigrationError> {
    // Create or alter the catalog tables
    conn.execute_batch(migration.sql)
        .map_err(|e| migration.failed(e))?;

    // Record the script so it is skipped next time
    conn.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?, ?)",
        rusqlite::params![migration.version, migration.name],
    )
    .map_err(|e| migration.failed(e))?;

    Ok(())
}

/// Bring a catalog connection up to the newest schema.
///
/// Every pending script runs in its own transaction, so a failing script
/// leaves the catalog at the last version that applied cleanly. Folder rows
/// reference their parents without `ON DELETE CASCADE`; subtree deletes are
/// done by the query layer, but foreign key checks are still switched on for
/// the connection here.
///
/// Returns the number of scripts applied, or
/// [`MigrationError::NewerSchema`] when the catalog is ahead of this build.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    // Foreign keys are per connection in SQLite
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    init_migrations_table(conn)?;

    let current = catalog_version(conn)?;
    let supported = supported_version();
    if current > supported {
        return Err(MigrationError::NewerSchema {
            found: current,
            supported,
        });
    }

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.unchecked_transaction()?;
        apply_migration(&tx, migration)?;
        tx.commit().map_err(|e| migration.failed(e))?;
        applied += 1;
    }

    Ok(applied)
}
