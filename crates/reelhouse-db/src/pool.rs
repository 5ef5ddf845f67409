//! Database connection pool management.
//!
//! This module provides connection pooling for SQLite using r2d2.
//! It handles pool initialization, connection customization, and running migrations.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use reelhouse_common::{Error, Result};
use rusqlite::OpenFlags;

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// How long a connection waits on a write lock held by another connection
/// (for example a scan committing a batch) before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialize a new database pool with the given file path.
///
/// This function will:
/// - Create the SQLite database file if it doesn't exist
/// - Enable foreign keys, WAL journaling, and a busy timeout on every connection
/// - Run pending database migrations
///
/// # Example
///
/// ```no_run
/// use reelhouse_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/reelhouse/catalog.sqlite").unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)
    });

    build_pool(manager, 8)
}

/// Initialize an in-memory database pool for testing.
///
/// Every connection in the pool attaches to the same uniquely named
/// shared-cache database, which lives until the pool is dropped.
///
/// # Example
///
/// ```
/// use reelhouse_db::pool::init_memory_pool;
///
/// let pool = init_memory_pool().unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_memory_pool() -> Result<DbPool> {
    let uri = format!(
        "file:reelhouse-{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4()
    );
    let manager = SqliteConnectionManager::file(uri)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    build_pool(manager, 4)
}

fn build_pool(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {}", e)))?;

    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

    Ok(pool)
}

/// Get a connection from the pool.
///
/// This is a convenience wrapper around `pool.get()` that converts the
/// r2d2 error into our common Error type.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}
