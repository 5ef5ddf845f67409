//! Batched catalog writes.

use anyhow::{Context, Result};
use reelhouse_common::{FolderId, MediaId};
use reelhouse_db::{
    models::NewMedia,
    queries::{folders, media},
};
use rusqlite::Connection;

/// A catalog write waiting for the next flush.
#[derive(Debug)]
enum PendingWrite {
    FolderMarker {
        id: FolderId,
        marker: i64,
        parent_id: Option<FolderId>,
    },
    CreateMedia(NewMedia),
    UpdateMedia(MediaId, NewMedia),
}

/// Groups scanner writes into transactions of `batch_size` files.
///
/// Writes are queued in memory and applied in one short transaction when the
/// batch fills, so no write lock is held while metadata is extracted. Folder
/// markers are queued with the media so a crash never leaves a directory
/// marked current before its files are. Dropping the writer discards whatever
/// was not flushed.
pub struct BatchWriter<'c> {
    conn: &'c Connection,
    pending: Vec<PendingWrite>,
    batch_size: usize,
    files: usize,
    commits: usize,
}

impl<'c> BatchWriter<'c> {
    pub fn new(conn: &'c Connection, batch_size: usize) -> Self {
        Self {
            conn,
            pending: Vec::new(),
            batch_size: batch_size.max(1),
            files: 0,
            commits: 0,
        }
    }

    /// Connection for writes that must happen immediately, such as inserts
    /// whose row id is needed right away. Each statement autocommits.
    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    /// Queue a folder marker (and parent) update.
    pub fn update_folder(&mut self, id: FolderId, marker: i64, parent_id: Option<FolderId>) {
        self.pending.push(PendingWrite::FolderMarker {
            id,
            marker,
            parent_id,
        });
    }

    /// Queue a new media row, committing when the batch is full.
    pub fn create_media(&mut self, record: NewMedia) -> Result<()> {
        self.pending.push(PendingWrite::CreateMedia(record));
        self.record()
    }

    /// Queue a media update, committing when the batch is full.
    pub fn update_media(&mut self, id: MediaId, record: NewMedia) -> Result<()> {
        self.pending.push(PendingWrite::UpdateMedia(id, record));
        self.record()
    }

    fn record(&mut self) -> Result<()> {
        self.files += 1;
        if self.files >= self.batch_size {
            self.commit()?;
        }
        Ok(())
    }

    /// Apply every queued write in one transaction.
    pub fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            self.files = 0;
            return Ok(());
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin scan batch")?;

        for write in self.pending.drain(..) {
            match write {
                PendingWrite::FolderMarker {
                    id,
                    marker,
                    parent_id,
                } => folders::update_folder_marker(&tx, id, marker, parent_id)?,
                PendingWrite::CreateMedia(record) => {
                    media::create_media(&tx, &record)?;
                }
                PendingWrite::UpdateMedia(id, record) => media::update_media(&tx, id, &record)?,
            }
        }

        tx.commit().context("Failed to commit scan batch")?;
        self.commits += 1;
        tracing::trace!(files = self.files, "Committed scan batch");
        self.files = 0;
        Ok(())
    }

    /// Commit remaining writes and return how many batches were committed.
    pub fn finish(mut self) -> Result<usize> {
        self.commit()?;
        Ok(self.commits)
    }

    /// Drop queued writes without applying them.
    pub fn discard(self) -> usize {
        self.pending.len()
    }
}
