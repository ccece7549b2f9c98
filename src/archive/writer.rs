//! Best-effort zip archive writer
//!
//! Each entry is compressed into a single-entry archive in memory first and
//! then raw-copied into the destination archive. The destination therefore
//! only ever sees complete local headers with known sizes, written strictly
//! forward, and a destination that refuses bytes never leaves a torn entry
//! behind: the refused bytes stay in the `Spool` and are retried on the
//! next entry and again when the archive is closed.

use crate::error::{ContainedFailure, Error, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Result of writing one entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The entry is in the archive
    Written,
    /// The entry could not be written and was skipped
    Skipped(ContainedFailure),
}

impl WriteOutcome {
    /// Whether the entry made it into the archive
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Append-only buffer between the zip encoder and the destination
///
/// Writes always succeed into the queue; [`flush`](Write::flush) hands the
/// queue to the destination and keeps whatever it refused.
struct Spool<W: Write> {
    inner: W,
    pending: Vec<u8>,
    position: u64,
}

impl<W: Write> Spool<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            position: 0,
        }
    }

    fn drain(&mut self) -> io::Result<()> {
        while !self.pending.is_empty() {
            match self.inner.write(&self.pending) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "archive destination accepted no bytes",
                    ));
                }
                Ok(n) => {
                    self.pending.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.inner.flush()
    }

    fn into_inner(mut self) -> io::Result<W> {
        self.drain()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for Spool<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()
    }
}

impl<W: Write> Seek for Spool<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Current(0) => Ok(self.position),
            SeekFrom::Start(p) if p == self.position => Ok(self.position),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "archive destination is append-only",
            )),
        }
    }
}

/// Compress `content` into a one-entry archive held in memory
fn stage(path: &str, content: &str, options: FileOptions) -> Result<ZipArchive<Cursor<Vec<u8>>>> {
    let mut staging = ZipWriter::new(Cursor::new(Vec::new()));
    staging.start_file(path, options)?;
    staging.write_all(content.as_bytes())?;
    let buffer = staging.finish()?;
    Ok(ZipArchive::new(buffer)?)
}

/// Writes text entries into a zip archive, containing per-entry failures
///
/// Opening the archive and closing it in [`finish`](Self::finish) are the only
/// operations that return errors; a failure while writing a single entry is
/// reported as [`WriteOutcome::Skipped`] and the archive stays usable. The
/// destination only needs [`Write`]: it is never seeked.
pub struct ArchiveWriter<W: Write> {
    zip: ZipWriter<Spool<W>>,
    options: FileOptions,
    names: HashSet<String>,
    entries_written: u64,
}

impl ArchiveWriter<File> {
    /// Create (or truncate) the archive file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Failed to create archive '{}': {}", path.display(), e),
            ))
        })?;
        debug!(archive = %path.display(), "opened archive");
        Ok(Self::new(file))
    }
}

impl<W: Write> ArchiveWriter<W> {
    /// Start an empty archive over `sink`
    pub fn new(sink: W) -> Self {
        Self {
            zip: ZipWriter::new(Spool::new(sink)),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
            names: HashSet::new(),
            entries_written: 0,
        }
    }

    /// Write `content` as UTF-8 into a new entry at `path`
    pub fn write(&mut self, path: &str, content: &str) -> WriteOutcome {
        let result = if path.is_empty() || self.names.contains(path) {
            Err(Error::Archive(ZipError::InvalidArchive(
                "entry name is empty or already in the archive",
            )))
        } else {
            stage(path, content, self.options).and_then(|mut staged| {
                self.zip.raw_copy_file(staged.by_index(0)?)?;
                Ok(())
            })
        };

        match result {
            Ok(()) => {
                self.names.insert(path.to_string());
                self.entries_written += 1;
                debug!(path, bytes = content.len(), "wrote archive entry");
                if let Err(e) = self.zip.flush() {
                    warn!(path, error = %e, "archive destination refused data, keeping it queued");
                }
                WriteOutcome::Written
            }
            Err(e) => {
                warn!(path, error = %e, "skipping archive entry");
                WriteOutcome::Skipped(ContainedFailure::entry(path, &e))
            }
        }
    }

    /// Entries successfully written so far
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Write the central directory, deliver every queued byte and hand back the sink
    pub fn finish(mut self) -> Result<W> {
        let spool = self.zip.finish()?;
        let sink = spool.into_inner().map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Failed to close archive: {}", e),
            ))
        })?;
        debug!(entries = self.entries_written, "closed archive");
        Ok(sink)
    }
}
