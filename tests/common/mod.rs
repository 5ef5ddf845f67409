//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temporary library directory, a
//! file-backed catalog, a [`FixedExtractor`] and a full [`AppContext`]. The
//! [`TestHarness::serve`] method starts Axum on a random port for HTTP-level
//! testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelhouse::config::Config;
use reelhouse::scanner::FolderScanner;
use reelhouse::server::{create_router, AppContext};
use reelhouse_av::{FixedExtractor, MediaAttributes};
use reelhouse_common::{FolderId, UserId};
use reelhouse_db::pool::{init_pool, DbPool, PooledConnection};
use tempfile::TempDir;

/// Attributes the harness extractor reports for every file by default.
pub fn sample_attributes() -> MediaAttributes {
    MediaAttributes {
        duration_ms: 25_000,
        width: 1280,
        height: 720,
        bitrate_kbps: 2400,
        audio_tracks: vec!["eng".to_string(), "jpn".to_string()],
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] backed by a
/// catalog file in a temporary directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub extractor: Arc<FixedExtractor>,
    dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        Self::with_extractor(config, |_| FixedExtractor::new(sample_attributes()))
    }

    /// Create a new harness whose extractor is built from the library path,
    /// so tests can single out files before they exist.
    pub fn with_extractor(
        config: Config,
        build: impl FnOnce(&Path) -> FixedExtractor,
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let library = dir.path().join("library");
        std::fs::create_dir(&library).expect("failed to create library dir");
        let extractor = build(&library);

        let db_path = dir.path().join("catalog.sqlite");
        let db = init_pool(&db_path.to_string_lossy()).expect("failed to create pool");

        let extractor = Arc::new(extractor);

        let ctx = AppContext::new(config, db.clone(), extractor.clone())
            .expect("failed to build context");

        Self {
            ctx,
            db,
            extractor,
            dir,
        }
    }

    /// The library directory that tests register as a root.
    pub fn library(&self) -> PathBuf {
        self.dir.path().join("library")
    }

    /// Create a file (and its parent directories) below the library.
    pub fn write_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.library().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, contents).expect("failed to write file");
        path
    }

    /// Register `path` as a root owned by user 1.
    pub fn add_root(&self, path: &Path, exclude_autoscan: bool) -> FolderId {
        let conn = self.conn();
        reelhouse::scanner::add_root(&conn, path, UserId::from(1), exclude_autoscan)
            .expect("failed to add root")
            .id
    }

    /// Register the library directory as a root.
    pub fn add_library_root(&self) -> FolderId {
        self.add_root(&self.library(), false)
    }

    pub fn scanner(&self) -> &Arc<FolderScanner> {
        self.ctx.dispatcher.scanner()
    }

    /// Start an Axum server on a random port and return the bound address.
    pub async fn serve(&self) -> SocketAddr {
        let app = create_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        addr
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> PooledConnection {
        reelhouse_db::pool::get_conn(&self.db).expect("failed to get db connection")
    }
}
