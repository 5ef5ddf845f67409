//! Incremental folder scanner.
//!
//! A scan keeps the catalog in step with one folder tree. It takes the
//! folder's durable lock, deletes rows whose files are gone, snapshots the
//! remaining catalog markers into a [`ScanCache`], then walks the tree and
//! writes only what changed, committing in batches. The lock is released and
//! the scan time recorded whatever the walk's outcome.
//!
//! Change detection compares filesystem mtimes (whole seconds) with the
//! `last_modification` marker stored on every folder and media row.

mod batch;
mod cache;
mod clean;
mod dispatch;
mod roots;

pub use batch::BatchWriter;
pub use cache::ScanCache;
pub use clean::{remove_missing, remove_vanished, Cleaned};
pub use dispatch::{
    start_job_cleanup, start_scheduler, JobStatus, ScanDispatcher, ScanHandle, ScanJob,
    DEFAULT_JOB_RETENTION_SECS,
};
pub use roots::{add_root, register_configured_roots, unlock};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use reelhouse_av::{MediaAttributes, MetadataExtractor};
use reelhouse_common::{paths::has_allowed_extension, FolderId};
use reelhouse_db::{
    models::{Folder, LockAttempt, NewMedia},
    pool::DbPool,
    queries::folders,
};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;

/// Incremental scans compare markers; full scans zero them first so every
/// file is re-extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Incremental,
    Full,
}

/// Scanner settings.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub batch_size: usize,
    pub trust_directory_mtime: bool,
    /// Lowercase extensions without the dot.
    pub extensions: Vec<String>,
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.scan.batch_size,
            trust_directory_mtime: config.scan.trust_directory_mtime,
            extensions: config.library.extensions.clone(),
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Counters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub folders_created: usize,
    pub folders_updated: usize,
    pub folders_deleted: usize,
    pub media_created: usize,
    pub media_updated: usize,
    pub media_deleted: usize,
    /// Files whose marker showed no change.
    pub files_unchanged: usize,
    pub extraction_failures: usize,
    pub batches_committed: usize,
    pub elapsed_ms: u64,
}

impl ScanReport {
    /// Catalog rows created, updated or deleted.
    pub fn writes(&self) -> usize {
        self.folders_created
            + self.folders_updated
            + self.folders_deleted
            + self.media_created
            + self.media_updated
            + self.media_deleted
    }
}

/// How a scan request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Another scan holds the folder's lock. Nothing was touched.
    NotStarted,
    /// The folder's directory is gone. Its rows and everything below them
    /// were removed from the catalog.
    Vanished,
    Completed(ScanReport),
    /// Stopped through the stop signal; writes so far are committed.
    Cancelled(ScanReport),
}

impl ScanOutcome {
    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            Self::Completed(report) | Self::Cancelled(report) => Some(report),
            Self::NotStarted | Self::Vanished => None,
        }
    }
}

enum WalkEnd {
    Finished,
    Cancelled,
    Vanished,
}

/// A directory seen during the walk.
struct DirState {
    id: FolderId,
    unchanged: bool,
}

/// Scans folder trees into the catalog.
pub struct FolderScanner {
    pool: DbPool,
    extractor: Arc<dyn MetadataExtractor>,
    options: ScanOptions,
    stop: Arc<AtomicBool>,
}

impl FolderScanner {
    pub fn new(pool: DbPool, extractor: Arc<dyn MetadataExtractor>, options: ScanOptions) -> Self {
        Self {
            pool,
            extractor,
            options,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting this flag cancels running scans at the next directory.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Incrementally scan a folder.
    pub fn scan(&self, folder_id: FolderId) -> Result<ScanOutcome> {
        self.scan_with_mode(folder_id, ScanMode::Incremental)
    }

    /// Reset every marker below a folder, then scan it.
    pub fn full_scan(&self, folder_id: FolderId) -> Result<ScanOutcome> {
        self.scan_with_mode(folder_id, ScanMode::Full)
    }

    pub fn scan_with_mode(&self, folder_id: FolderId, mode: ScanMode) -> Result<ScanOutcome> {
        let started = Instant::now();
        let conn = self.pool.get()?;

        match folders::try_lock_folder(&conn, folder_id)? {
            LockAttempt::Acquired => {}
            LockAttempt::AlreadyLocked => {
                info!(folder_id = %folder_id, "Scan already in progress, not starting");
                return Ok(ScanOutcome::NotStarted);
            }
            LockAttempt::NotFound => return Err(anyhow!("Folder not found: {}", folder_id)),
        }

        let result = self.scan_locked(&conn, folder_id, mode, started);
        let elapsed_ms = started.elapsed().as_millis() as i64;

        let released = match &result {
            Ok(ScanOutcome::Vanished) => folders::unlock_folder(&conn, folder_id),
            _ => folders::finish_scan(&conn, folder_id, elapsed_ms),
        };
        if let Err(e) = released {
            error!(folder_id = %folder_id, error = %e, "Failed to release scan lock");
        }

        match &result {
            Ok(ScanOutcome::Completed(report)) => info!(
                folder_id = %folder_id,
                writes = report.writes(),
                unchanged = report.files_unchanged,
                failures = report.extraction_failures,
                elapsed_ms = report.elapsed_ms,
                "Scan completed"
            ),
            Ok(ScanOutcome::Cancelled(report)) => {
                info!(folder_id = %folder_id, writes = report.writes(), "Scan cancelled")
            }
            Ok(ScanOutcome::Vanished) => warn!(folder_id = %folder_id, "Folder vanished"),
            Ok(ScanOutcome::NotStarted) => {}
            Err(e) => error!(folder_id = %folder_id, error = %e, "Scan failed"),
        }

        result
    }

    /// Scan every root not excluded from autoscan. A failing root is logged
    /// and skipped.
    pub fn scan_all_roots(&self) -> Result<Vec<(FolderId, ScanOutcome)>> {
        let roots = {
            let conn = self.pool.get()?;
            folders::list_autoscan_roots(&conn)?
        };

        let mut outcomes = Vec::with_capacity(roots.len());
        for root in roots {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            match self.scan(root.id) {
                Ok(outcome) => outcomes.push((root.id, outcome)),
                Err(e) => error!(folder_id = %root.id, path = %root.path, error = %e, "Root scan failed"),
            }
        }

        Ok(outcomes)
    }

    fn scan_locked(
        &self,
        conn: &Connection,
        folder_id: FolderId,
        mode: ScanMode,
        started: Instant,
    ) -> Result<ScanOutcome> {
        let folder = folders::get_folder(conn, folder_id)?
            .ok_or_else(|| anyhow!("Folder not found: {}", folder_id))?;
        let target = PathBuf::from(&folder.path);

        if !target.is_dir() {
            remove_vanished(conn, &folder)?;
            return Ok(ScanOutcome::Vanished);
        }

        info!(folder_id = %folder_id, path = %folder.path, ?mode, "Scan started");

        if mode == ScanMode::Full {
            let (folders_reset, media_reset) = folders::reset_subtree_markers(conn, folder_id)?;
            debug!(folders_reset, media_reset, "Reset change markers");
        }

        let mut report = ScanReport::default();

        let cleaned = remove_missing(conn, &target, folder.owner_id, &self.options.extensions)?;
        report.folders_deleted = cleaned.folders;
        report.media_deleted = cleaned.media;

        let mut cache = ScanCache::load(conn, folder.owner_id)?;
        debug!(
            folders = cache.folder_count(),
            media = cache.media_count(),
            "Loaded scan cache"
        );

        let root_id = if folder.root {
            folder.id
        } else {
            folders::find_root(conn, folder.id)?
                .ok_or_else(|| anyhow!("Folder {} has no root", folder.id))?
        };

        let mut writer = BatchWriter::new(conn, self.options.batch_size);
        let end = self.walk(&folder, &target, root_id, &mut cache, &mut writer, &mut report)?;

        if let WalkEnd::Vanished = end {
            let dropped = writer.discard();
            debug!(dropped, "Dropped queued writes for vanished folder");
            remove_vanished(conn, &folder)?;
            return Ok(ScanOutcome::Vanished);
        }

        report.batches_committed = writer.finish()?;
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        Ok(match end {
            WalkEnd::Cancelled => ScanOutcome::Cancelled(report),
            _ => ScanOutcome::Completed(report),
        })
    }

    fn walk(
        &self,
        folder: &Folder,
        target: &Path,
        root_id: FolderId,
        cache: &mut ScanCache,
        writer: &mut BatchWriter<'_>,
        report: &mut ScanReport,
    ) -> Result<WalkEnd> {
        let owner = folder.owner_id;
        let mut dirs: HashMap<PathBuf, DirState> = HashMap::new();

        for entry in WalkDir::new(target).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if !target.is_dir() {
                        return Ok(WalkEnd::Vanished);
                    }
                    warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if self.stop.load(Ordering::Relaxed) {
                    return Ok(WalkEnd::Cancelled);
                }

                let mtime = match entry.metadata() {
                    Ok(meta) => mtime_secs(&meta),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Cannot stat directory");
                        continue;
                    }
                };
                let path_str = path.to_string_lossy().into_owned();

                let parent_id = if entry.depth() == 0 {
                    folder.parent_id
                } else {
                    match path.parent().and_then(|p| dirs.get(p)) {
                        Some(parent) => Some(parent.id),
                        None => {
                            warn!(path = %path_str, "Parent folder unknown, skipping");
                            continue;
                        }
                    }
                };

                let state = match cache.folder(&path_str) {
                    Some((id, marker)) if marker == mtime => DirState { id, unchanged: true },
                    Some((id, _)) => {
                        writer.update_folder(id, mtime, parent_id);
                        report.folders_updated += 1;
                        DirState { id, unchanged: false }
                    }
                    None => {
                        let Some(parent_id) = parent_id else {
                            warn!(path = %path_str, "Uncatalogued directory has no parent");
                            continue;
                        };
                        // Inserted with a zero marker; the real one lands with its batch
                        let id = folders::create_folder(writer.conn(), &path_str, parent_id, owner, 0)?;
                        writer.update_folder(id, mtime, Some(parent_id));
                        cache.insert_folder(path_str, id, mtime);
                        report.folders_created += 1;
                        DirState { id, unchanged: false }
                    }
                };

                dirs.insert(path.to_path_buf(), state);
                continue;
            }

            if !file_type.is_file() || !has_allowed_extension(path, &self.options.extensions) {
                continue;
            }

            let Some(dir) = path.parent().and_then(|p| dirs.get(p)) else {
                continue;
            };

            if self.options.trust_directory_mtime && dir.unchanged {
                report.files_unchanged += 1;
                continue;
            }

            let mtime = match entry.metadata() {
                Ok(meta) => mtime_secs(&meta),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot stat file");
                    continue;
                }
            };
            let path_str = path.to_string_lossy().into_owned();
            let cached = cache.media(&path_str);

            if let Some((_, marker)) = cached {
                if mtime <= marker {
                    report.files_unchanged += 1;
                    continue;
                }
            }

            let attrs = match self.extractor.extract(path) {
                Ok(attrs) => attrs,
                Err(e) => {
                    warn!(
                        path = %path_str,
                        extractor = self.extractor.name(),
                        error = %e,
                        "Metadata extraction failed, storing defaults"
                    );
                    report.extraction_failures += 1;
                    MediaAttributes::fallback()
                }
            };

            let record = NewMedia {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: path_str,
                folder_id: dir.id,
                root_folder_id: root_id,
                owner_id: owner,
                duration_ms: attrs.duration_ms as i64,
                width: attrs.width,
                height: attrs.height,
                bitrate_kbps: attrs.bitrate_kbps,
                audio_languages: attrs.audio_tracks,
                last_modification: mtime,
            };

            match cached {
                Some((id, _)) => {
                    writer.update_media(id, record)?;
                    report.media_updated += 1;
                }
                None => {
                    writer.create_media(record)?;
                    report.media_created += 1;
                }
            }
        }

        Ok(WalkEnd::Finished)
    }
}

/// Modification time in whole seconds since the epoch; 0 when unavailable.
fn mtime_secs(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
