//! Reelhouse-DB: Catalog schema, migrations, and query operations
//!
//! This crate provides the catalog store for reelhouse using SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching the `folders` and `media` tables
//! - `queries` - Point lookups, range lookups, and batched writes
//!
//! # Example
//!
//! ```no_run
//! use reelhouse_common::UserId;
//! use reelhouse_db::pool::{init_pool, get_conn};
//! use reelhouse_db::queries::folders;
//! use std::path::Path;
//!
//! let pool = init_pool("/var/lib/reelhouse/catalog.sqlite").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let root = folders::create_root_folder(&conn, Path::new("/srv/videos"), UserId::from(1), false).unwrap();
//! println!("Registered root {} at {}", root.id, root.path);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
