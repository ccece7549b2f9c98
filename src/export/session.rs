//! Per-run export state

use crate::archive::{ArchiveWriter, PathRegistry, WriteOutcome, canonicalize, range_suffix};
use crate::config::ExportConfig;
use crate::device::DeviceDescription;
use crate::error::{ContainedFailure, Error, Result};
use crate::types::{Event, Page, WalkProgress};
use crate::walker::WalkVisitor;
use std::io::Write;
use tokio::sync::broadcast;
use tracing::debug;

/// Counters of a closed session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionTotals {
    /// Listing pages written
    pub pages_archived: u64,
    /// Archive entries written (descriptions and pages)
    pub entries_written: u64,
    /// Failures absorbed during the run, in the order they happened
    pub failures: Vec<ContainedFailure>,
    /// Progress reported with the last page
    pub progress: WalkProgress,
}

/// Everything one export run owns: path registry, archive writer and the
/// failures absorbed so far
///
/// A session is built for a single run and consumed by [`finish`](Self::finish).
pub struct ExportSession<W: Write> {
    label: String,
    registry: PathRegistry,
    writer: ArchiveWriter<W>,
    description_base: String,
    cds_base: String,
    extension: String,
    events: broadcast::Sender<Event>,
    failures: Vec<ContainedFailure>,
    pages_archived: u64,
    progress: WalkProgress,
}

impl<W: Write> ExportSession<W> {
    /// Start a session for `device`, writing into `writer`
    pub fn new(
        config: &ExportConfig,
        device: &str,
        writer: ArchiveWriter<W>,
        events: broadcast::Sender<Event>,
    ) -> Self {
        let base = canonicalize(device);
        Self {
            label: device.to_string(),
            registry: PathRegistry::with_probe_limit(config.max_collision_probes),
            writer,
            description_base: format!("{}/{}", config.description_dir, base),
            cds_base: format!("{}/{}/cds", config.cds_dir, base),
            extension: config.entry_extension.clone(),
            events,
            failures: Vec::new(),
            pages_archived: 0,
            progress: WalkProgress::default(),
        }
    }

    fn emit(&self, event: Event) {
        self.events.send(event).ok();
    }

    fn record(&mut self, failure: ContainedFailure, event: Event) {
        self.failures.push(failure);
        self.emit(event);
    }

    /// Archive the device description, then every service description
    ///
    /// The device entry is named after the session's device label and each
    /// service entry after its service id.
    pub fn write_descriptions(&mut self, description: &DeviceDescription) -> Result<()> {
        let label = self.label.clone();
        let documents = std::iter::once((label.as_str(), description.xml.as_str())).chain(
            description
                .services
                .iter()
                .map(|s| (s.service_id.as_str(), s.description.as_str())),
        );
        for (name, xml) in documents {
            let path = self
                .registry
                .allocate(&self.description_base, name, &self.extension)?;
            match self.writer.write(&path, xml) {
                WriteOutcome::Written => self.emit(Event::DescriptionWritten { path }),
                WriteOutcome::Skipped(failure) => {
                    let error = failure.message.clone();
                    self.record(failure, Event::EntrySkipped { path, error });
                }
            }
        }
        Ok(())
    }

    /// Archive the raw payload of one listing page
    ///
    /// A page holding a container's whole listing is named after the
    /// container; otherwise the entry range is appended.
    pub fn archive_page(&mut self, page: &Page) -> Result<()> {
        let suffix = if page.covers_whole_listing() {
            self.extension.clone()
        } else {
            range_suffix(page.start, page.end(), &self.extension)
        };
        let path = self
            .registry
            .allocate(&self.cds_base, &page.container_id, &suffix)?;

        match self.writer.write(&path, &page.raw) {
            WriteOutcome::Written => {
                self.pages_archived += 1;
                debug!(container_id = %page.container_id, path = %path, "archived page");
                self.emit(Event::PageArchived {
                    container_id: page.container_id.clone(),
                    path,
                    start: page.start,
                    count: page.count,
                    total: page.total,
                });
            }
            WriteOutcome::Skipped(failure) => {
                let error = failure.message.clone();
                self.record(failure, Event::EntrySkipped { path, error });
            }
        }
        Ok(())
    }

    /// Failures absorbed so far
    pub fn failures(&self) -> &[ContainedFailure] {
        &self.failures
    }

    /// Close the archive
    pub fn finish(self) -> Result<SessionTotals> {
        let entries_written = self.writer.entries_written();
        self.writer.finish()?;
        Ok(SessionTotals {
            pages_archived: self.pages_archived,
            entries_written,
            failures: self.failures,
            progress: self.progress,
        })
    }
}

impl<W: Write> WalkVisitor for ExportSession<W> {
    fn on_page(&mut self, page: &Page, progress: WalkProgress) -> Result<()> {
        self.archive_page(page)?;
        self.progress = progress;
        self.emit(Event::Progress {
            visited: progress.visited,
            discovered: progress.discovered,
        });
        Ok(())
    }

    fn on_container_failed(&mut self, container_id: &str, error: &Error) {
        self.record(
            ContainedFailure::container(container_id, error),
            Event::ContainerFailed {
                container_id: container_id.to_string(),
                error: error.to_string(),
            },
        );
    }
}
