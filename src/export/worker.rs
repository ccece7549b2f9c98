//! Background export task and the one-export-at-a-time guard

use crate::error::{Error, Result};
use crate::types::ExportReport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Holds the exporter's busy flag for the duration of one export
pub(crate) struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl BusyGuard {
    /// Take the flag, or fail if another export holds it
    pub(crate) fn acquire(busy: &Arc<AtomicBool>) -> Result<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ExportInProgress)?;
        Ok(Self {
            busy: Arc::clone(busy),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Handle to an export running on a background task
#[derive(Debug)]
pub struct ExportHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<ExportReport>>,
}

impl ExportHandle {
    pub(crate) fn new(cancel: CancellationToken, task: JoinHandle<Result<ExportReport>>) -> Self {
        Self { cancel, task }
    }

    /// Ask the export to stop at its next cancellation point
    ///
    /// The archive is still closed; [`join`](Self::join) returns a report
    /// with a cancelled outcome.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this export when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the background task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the export to end
    pub async fn join(self) -> Result<ExportReport> {
        self.task
            .await
            .map_err(|e| Error::Other(format!("export task failed: {}", e)))?
    }
}
