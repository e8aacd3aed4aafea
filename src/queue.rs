//! The ordered pending-file queue.
//!
//! A job works on a snapshot of the queue and holds a [`JobGuard`] while it
//! runs. Additions are always allowed; removal, reordering and clearing are
//! refused with [`DocShiftError::QueueBusy`] until the guard is dropped.
//! Files added during a job land after the snapshot and are left for the
//! next one.

use crate::error::DocShiftError;
use crate::file::PendingFile;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct QueueState {
    files: Vec<PendingFile>,
    busy: bool,
}

/// Files awaiting conversion, in user order.
#[derive(Debug, Default)]
pub struct FileQueue {
    state: Mutex<QueueState>,
}

impl FileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn push(&self, file: PendingFile) {
        self.lock().files.push(file);
    }

    pub fn extend(&self, files: impl IntoIterator<Item = PendingFile>) {
        self.lock().files.extend(files);
    }

    pub fn len(&self) -> usize {
        self.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().files.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    /// Owned copy of the current order. Payloads are shared, not copied.
    pub fn snapshot(&self) -> Vec<PendingFile> {
        self.lock().files.clone()
    }

    /// Remove and return the file at `index`.
    pub fn remove(&self, index: usize) -> Result<PendingFile, DocShiftError> {
        let mut state = self.lock();
        if state.busy {
            return Err(DocShiftError::QueueBusy);
        }
        let len = state.files.len();
        if index >= len {
            return Err(DocShiftError::IndexOutOfRange { index, len });
        }
        Ok(state.files.remove(index))
    }

    pub fn clear(&self) -> Result<(), DocShiftError> {
        let mut state = self.lock();
        if state.busy {
            return Err(DocShiftError::QueueBusy);
        }
        state.files.clear();
        Ok(())
    }

    /// Drag-reorder: take the file out of `from` and insert it at `to`.
    ///
    /// `to` indexes the list after removal, so moving the first of three
    /// files to 2 puts it last.
    pub fn move_item(&self, from: usize, to: usize) -> Result<(), DocShiftError> {
        let mut state = self.lock();
        if state.busy {
            return Err(DocShiftError::QueueBusy);
        }
        let len = state.files.len();
        if from >= len {
            return Err(DocShiftError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(DocShiftError::IndexOutOfRange { index: to, len });
        }
        let file = state.files.remove(from);
        state.files.insert(to, file);
        debug!("Moved queue item {} → {}", from, to);
        Ok(())
    }

    /// Mark the queue busy and take the job's snapshot under the same lock.
    pub fn begin_job(&self) -> Result<JobGuard<'_>, DocShiftError> {
        let mut state = self.lock();
        if state.busy {
            return Err(DocShiftError::QueueBusy);
        }
        state.busy = true;
        Ok(JobGuard {
            queue: self,
            snapshot: state.files.clone(),
        })
    }
}

/// Keeps a [`FileQueue`] busy until dropped.
#[derive(Debug)]
pub struct JobGuard<'a> {
    queue: &'a FileQueue,
    snapshot: Vec<PendingFile>,
}

impl JobGuard<'_> {
    /// The files this job owns, in queue order at [`FileQueue::begin_job`].
    pub fn snapshot(&self) -> &[PendingFile] {
        &self.snapshot
    }

    /// Release the queue and remove the snapshot's files from it.
    ///
    /// While busy the queue only grows at the tail, so the snapshot is
    /// always its leading entries.
    pub fn finish_and_clear(self) {
        let mut state = self.queue.lock();
        let taken = self.snapshot.len().min(state.files.len());
        state.files.drain(..taken);
        debug!("Job finished: {} files removed, {} remain", taken, state.files.len());
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.queue.lock().busy = false;
    }
}
