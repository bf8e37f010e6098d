//! Batch lifecycle
//!
//! A two-state machine, `Closed` (initial) and `Open`, over a monotonically
//! increasing batch id. Opening never reuses an id that has already been
//! opened: the first open uses the initial id, and every later open (whether
//! the current batch is still open or was closed) advances to a fresh one.

use serde::{Deserialize, Serialize};

pub type BatchId = u64;

/// Snapshot of the lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("batch {batch_id} is closed")]
    BatchClosed { batch_id: BatchId },
}

#[derive(Debug, Clone, Default)]
pub struct BatchLifecycle {
    id: BatchId,
    open: bool,
    // whether `id` has ever been opened
    used: bool,
}

impl BatchLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Batch {
        Batch {
            id: self.id,
            open: self.open,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open a batch, advancing the id first if the current one was already used.
    pub fn open(&mut self) -> BatchId {
        if self.used {
            self.id += 1;
        }
        self.used = true;
        self.open = true;
        self.id
    }

    pub fn close(&mut self) -> Result<BatchId, BatchError> {
        self.ensure_open()?;
        self.open = false;
        Ok(self.id)
    }

    pub fn ensure_open(&self) -> Result<BatchId, BatchError> {
        if !self.open {
            return Err(BatchError::BatchClosed { batch_id: self.id });
        }
        Ok(self.id)
    }
}
