//! Background scan jobs and the periodic rescan task.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reelhouse_common::{FolderId, ScanJobId};
use serde::Serialize;
use tokio::task::JoinHandle;

use super::{FolderScanner, ScanMode, ScanOutcome, ScanReport};

/// State of a dispatched scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Finished(ScanReport),
    NotStarted,
    Vanished,
    Cancelled(ScanReport),
    Failed { error: String },
}

impl JobStatus {
    fn from_result(result: &anyhow::Result<ScanOutcome>) -> Self {
        match result {
            Ok(ScanOutcome::Completed(report)) => Self::Finished(report.clone()),
            Ok(ScanOutcome::Cancelled(report)) => Self::Cancelled(report.clone()),
            Ok(ScanOutcome::NotStarted) => Self::NotStarted,
            Ok(ScanOutcome::Vanished) => Self::Vanished,
            Err(e) => Self::Failed {
                error: format!("{:#}", e),
            },
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// A dispatched scan as seen by pollers.
#[derive(Debug, Clone, Serialize)]
pub struct ScanJob {
    pub id: ScanJobId,
    pub folder_id: FolderId,
    pub mode: ScanMode,
    #[serde(flatten)]
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A running scan. Awaiting `join` yields the scan's result.
pub struct ScanHandle {
    pub id: ScanJobId,
    pub join: JoinHandle<anyhow::Result<ScanOutcome>>,
}

/// Runs scans on the blocking pool and tracks their status.
#[derive(Clone)]
pub struct ScanDispatcher {
    scanner: Arc<FolderScanner>,
    jobs: Arc<DashMap<ScanJobId, ScanJob>>,
}

impl ScanDispatcher {
    pub fn new(scanner: Arc<FolderScanner>) -> Self {
        Self {
            scanner,
            jobs: Arc::new(DashMap::new()),
        }
    }

    pub fn scanner(&self) -> &Arc<FolderScanner> {
        &self.scanner
    }

    /// Start a scan in the background. Must be called inside a tokio runtime.
    pub fn dispatch(&self, folder_id: FolderId, mode: ScanMode) -> ScanHandle {
        let id = ScanJobId::new();
        self.jobs.insert(
            id,
            ScanJob {
                id,
                folder_id,
                mode,
                status: JobStatus::Running,
                started_at: Utc::now(),
                finished_at: None,
            },
        );
        tracing::debug!(job_id = %id, folder_id = %folder_id, ?mode, "Dispatched scan");

        let scanner = self.scanner.clone();
        let jobs = self.jobs.clone();
        let join = tokio::task::spawn_blocking(move || {
            let result = scanner.scan_with_mode(folder_id, mode);
            if let Some(mut job) = jobs.get_mut(&id) {
                job.status = JobStatus::from_result(&result);
                job.finished_at = Some(Utc::now());
            }
            result
        });

        ScanHandle { id, join }
    }

    /// Look up a dispatched scan.
    pub fn job(&self, id: ScanJobId) -> Option<ScanJob> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    /// All known jobs, newest first.
    pub fn jobs(&self) -> Vec<ScanJob> {
        let mut jobs: Vec<ScanJob> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }

    /// Ask running scans to stop at the next directory.
    pub fn stop(&self) {
        self.scanner.stop_signal().store(true, Ordering::Relaxed);
    }

    /// Forget jobs that finished more than `retention` ago. Running jobs are
    /// always kept.
    ///
    /// Returns the number of jobs removed.
    pub fn prune_finished(&self, retention: Duration) -> usize {
        let now = Utc::now();
        let retention = chrono::Duration::from_std(retention)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_JOB_RETENTION_SECS as i64));

        let mut removed = 0;
        self.jobs.retain(|_, job| {
            if job.status.is_running() {
                return true;
            }
            match job.finished_at {
                Some(finished) if now - finished >= retention => {
                    removed += 1;
                    false
                }
                _ => true,
            }
        });

        if removed > 0 {
            tracing::debug!(removed, "Pruned finished scan jobs");
        }

        removed
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// How long finished jobs stay pollable when not configured.
pub const DEFAULT_JOB_RETENTION_SECS: u64 = 3600;

/// Start a background task that prunes finished jobs every `interval`.
pub fn start_job_cleanup(
    dispatcher: ScanDispatcher,
    interval: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            dispatcher.prune_finished(retention);
        }
    })
}

/// Start a background task that rescans every autoscan root each `interval`.
///
/// The first rescan runs one interval after startup.
pub fn start_scheduler(dispatcher: ScanDispatcher, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let scanner = dispatcher.scanner().clone();
            if scanner.stop_signal().load(Ordering::Relaxed) {
                break;
            }

            tracing::info!("Starting scheduled rescan");
            match tokio::task::spawn_blocking(move || scanner.scan_all_roots()).await {
                Ok(Ok(outcomes)) => {
                    tracing::info!(roots = outcomes.len(), "Scheduled rescan finished")
                }
                Ok(Err(e)) => tracing::error!(error = %e, "Scheduled rescan failed"),
                Err(e) => tracing::error!(error = %e, "Scheduled rescan task panicked"),
            }
        }
    })
}
