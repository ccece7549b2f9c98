//! Export coordination split into focused submodules.
//!
//! The [`Exporter`] struct and its methods are organized by concern:
//! - [`session`] - Per-run state: path registry, archive writer, contained failures
//! - [`worker`] - Background export task, handle and the one-export-at-a-time guard

mod session;
mod worker;


pub use session::{ExportSession, SessionTotals};
pub use worker::ExportHandle;

use crate::archive::{ArchiveWriter, canonicalize};
use crate::config::Config;
use crate::device::MediaServer;
use crate::error::{Error, Result};
use crate::fetch::BrowseOptions;
use crate::types::{Event, ExportOutcome, ExportReport};
use crate::walker::{TreeWalker, WalkSummary};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use worker::BusyGuard;

/// File name an export of `device` is saved under
///
/// ```
/// use cds_extract::archive_file_name;
///
/// assert_eq!(archive_file_name("Living Room: NAS"), "Living Room_ NAS.zip");
/// ```
pub fn archive_file_name(device: &str) -> String {
    format!("{}.zip", canonicalize(device))
}

/// Snapshots media servers into zip archives (cloneable, all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Exporter {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Set while an export is running
    pub(crate) busy: Arc<AtomicBool>,
}

impl Exporter {
    /// Create an exporter after validating `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        Ok(Self {
            event_tx,
            config: Arc::new(config),
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Subscribe to export events
    ///
    /// Each call returns an independent receiver. Receivers that fall more
    /// than 1000 events behind get `RecvError::Lagged` and skip ahead.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Whether an export is running right now
    pub fn is_busy(&self) -> bool {
        self.busy.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Emit an event to all subscribers; dropped when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Export `server` into the zip archive at `archive`
    ///
    /// Writes the device and service descriptions, walks the content directory
    /// breadth-first from the configured root, and closes the archive. A
    /// cancelled run still closes the archive and returns a report with
    /// [`ExportOutcome::Cancelled`]. Per-container and per-entry failures are
    /// collected in the report; allocation exhaustion and archive open/close
    /// errors are returned as errors.
    ///
    /// Only one export runs at a time per exporter; a second concurrent call
    /// fails with [`Error::ExportInProgress`].
    pub async fn export(
        &self,
        server: &MediaServer,
        archive: &Path,
        cancel: CancellationToken,
    ) -> Result<ExportReport> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        self.export_locked(server, archive, cancel).await
    }

    /// Export into `dir`, naming the archive after the device
    ///
    /// `dir` is created if it does not exist.
    pub async fn export_to_dir(
        &self,
        server: &MediaServer,
        dir: &Path,
        cancel: CancellationToken,
    ) -> Result<ExportReport> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create output directory '{}': {}", dir.display(), e),
            ))
        })?;
        let archive = dir.join(archive_file_name(server.label()));
        self.export(server, &archive, cancel).await
    }

    /// Run an export with the busy flag already held and report its end state
    pub(crate) async fn export_locked(
        &self,
        server: &MediaServer,
        archive: &Path,
        cancel: CancellationToken,
    ) -> Result<ExportReport> {
        match self.run(server, archive, cancel).await {
            Ok(report) => {
                info!(
                    device = %report.device,
                    outcome = ?report.outcome,
                    visited = report.containers_visited,
                    pages = report.pages_archived,
                    failures = report.failures.len(),
                    "export finished"
                );
                let event = match report.outcome {
                    ExportOutcome::Completed => Event::ExportComplete {
                        report: report.clone(),
                    },
                    ExportOutcome::Cancelled => Event::ExportCancelled {
                        report: report.clone(),
                    },
                };
                self.emit_event(event);
                Ok(report)
            }
            Err(e) => {
                error!(archive = %archive.display(), error = %e, "export failed");
                self.emit_event(Event::ExportFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        server: &MediaServer,
        archive: &Path,
        cancel: CancellationToken,
    ) -> Result<ExportReport> {
        let started_at = Utc::now();
        let device = server.label().to_string();
        let export_config = &self.config.export;

        info!(device = %device, archive = %archive.display(), "starting export");
        self.emit_event(Event::ExportStarted {
            device: device.clone(),
            archive: archive.to_path_buf(),
        });

        let writer = ArchiveWriter::create(archive)?;
        let mut session =
            ExportSession::new(export_config, &device, writer, self.event_tx.clone());

        let walked: Result<Option<WalkSummary>> = async {
            if cancel.is_cancelled() {
                return Ok::<_, Error>(None);
            }
            session.write_descriptions(server.description())?;
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let options = BrowseOptions::from(export_config);
            let walker = TreeWalker::new(server, options, cancel.clone());
            walker
                .walk(&export_config.root_id, &mut session)
                .await
                .map(Some)
        }
        .await;

        // The archive is closed even when the walk failed
        let closed = session.finish();
        let summary = walked?;
        let totals = closed?;

        let (cancelled, progress) = match &summary {
            Some(summary) => (summary.cancelled, summary.progress()),
            None => (true, totals.progress),
        };

        Ok(ExportReport {
            outcome: if cancelled {
                ExportOutcome::Cancelled
            } else {
                ExportOutcome::Completed
            },
            device,
            archive: archive.to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            containers_visited: progress.visited,
            containers_discovered: progress.discovered,
            pages_archived: totals.pages_archived,
            entries_written: totals.entries_written,
            failures: totals.failures,
        })
    }

    /// Run an export of `server` on a background task
    ///
    /// Fails immediately with [`Error::ExportInProgress`] if an export is
    /// already running. Progress arrives on [`subscribe`](Self::subscribe);
    /// the returned handle cancels the run or waits for its report.
    pub fn spawn(&self, server: Arc<MediaServer>, archive: PathBuf) -> Result<ExportHandle> {
        let guard = BusyGuard::acquire(&self.busy)?;
        let cancel = CancellationToken::new();
        let exporter = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            exporter.export_locked(&server, &archive, token).await
        });
        Ok(ExportHandle::new(cancel, task))
    }
}
