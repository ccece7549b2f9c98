//! Error types for cds-extract
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] type and [`Result`] alias
//! - Protocol errors raised while paging through a container listing
//! - [`ContainedFailure`] records for errors that were absorbed instead of aborting an export

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for cds-extract operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cds-extract
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "chunk_size")
        key: Option<String>,
    },

    /// Malformed or inconsistent paginated response
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The remote call failed outright
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// XML document could not be parsed
    #[error("XML error: {0}")]
    Xml(String),

    /// The device is not a usable media server
    #[error("invalid device: {0}")]
    InvalidDevice(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive (zip) error
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Every collision suffix for an archive path is already taken
    #[error("no free archive path left for {path}")]
    Allocation {
        /// The path that could not be made unique
        path: String,
    },

    /// Another export is already running on this exporter
    #[error("an export is already in progress")]
    ExportInProgress,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the paginated listing protocol
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Server declared a negative entry count or total
    #[error("container {container} returned negative counts (count={count}, total={total})")]
    NegativeCount {
        /// Container being fetched
        container: String,
        /// Declared number of returned entries
        count: i64,
        /// Declared total number of entries
        total: i64,
    },

    /// Server declared entries but none could be decoded
    #[error("container {container} declared {count} entries but none could be decoded")]
    EmptyPage {
        /// Container being fetched
        container: String,
        /// Declared number of returned entries
        count: i64,
    },

    /// Declared entry count does not match the decoded entries
    #[error("container {container} declared {declared} entries but {decoded} were decoded")]
    CountMismatch {
        /// Container being fetched
        container: String,
        /// Declared number of returned entries
        declared: i64,
        /// Number of entries actually decoded
        decoded: usize,
    },

    /// Response could not be interpreted at all
    #[error("malformed response for container {container}: {reason}")]
    Malformed {
        /// Container being fetched
        container: String,
        /// What was wrong with the response
        reason: String,
    },

    /// The service answered with a UPnP fault
    #[error("UPnP fault {code}: {description}")]
    Fault {
        /// UPnP error code
        code: u32,
        /// UPnP error description
        description: String,
    },
}

impl Error {
    /// Whether this error must abort a whole export
    ///
    /// Protocol, transport and per-entry failures are contained by the exporter;
    /// only path exhaustion, archive open/close failures and a refused concurrent
    /// export end the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Allocation { .. } | Error::Io(_) | Error::Archive(_) | Error::ExportInProgress
        )
    }
}

/// Scope of a contained failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Paging through a container stopped early
    Container,
    /// A single archive entry could not be written
    Entry,
}

/// An error that was absorbed so the export could continue
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainedFailure {
    /// What kind of unit failed
    pub kind: FailureKind,
    /// Container id or archive path the failure applies to
    pub subject: String,
    /// Rendered error message
    pub message: String,
}

impl ContainedFailure {
    /// Failure while fetching the pages of a container
    pub fn container(container_id: impl Into<String>, error: &Error) -> Self {
        Self {
            kind: FailureKind::Container,
            subject: container_id.into(),
            message: error.to_string(),
        }
    }

    /// Failure while writing one archive entry
    pub fn entry(path: impl Into<String>, error: &Error) -> Self {
        Self {
            kind: FailureKind::Entry,
            subject: path.into(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for ContainedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            FailureKind::Container => "container",
            FailureKind::Entry => "entry",
        };
        write!(f, "{} {}: {}", kind, self.subject, self.message)
    }
}
