//! # cds-extract
//!
//! Snapshot a UPnP media server's ContentDirectory into a zip archive.
//!
//! ## Design Philosophy
//!
//! cds-extract is designed to be:
//! - **Lenient** - A broken container or an unwritable entry is recorded and skipped, never fatal
//! - **Cancellable** - One token stops paging and traversal at the next page boundary
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use cds_extract::{Config, Exporter, MediaServer, http_client};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = http_client(&config.http)?;
//!     let server = MediaServer::connect(&client, "http://192.168.1.10:8200/rootDesc.xml").await?;
//!
//!     let exporter = Exporter::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = exporter.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = exporter
//!         .export_to_dir(&server, Path::new("exports"), CancellationToken::new())
//!         .await?;
//!     println!("{} pages, {} failures", report.pages_archived, report.failures.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive path allocation and zip writing
pub mod archive;
/// Configuration types
pub mod config;
/// ContentDirectory Browse action over SOAP
pub mod control;
/// Device description and media server connection
pub mod device;
/// DIDL-Lite response decoding
pub mod didl;
/// Error types
pub mod error;
/// Export coordination (decomposed into focused submodules)
pub mod export;
/// Paginated listing fetch
pub mod fetch;
/// Core types and events
pub mod types;
/// Breadth-first container traversal
pub mod walker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, ExportConfig, HttpConfig};
pub use control::{BrowseAction, BrowseRequest, BrowseResponse, SoapBrowseAction};
pub use device::{DeviceDescription, MediaServer, ServiceDescription, http_client};
pub use didl::{DidlDecoder, ResponseDecoder};
pub use error::{ContainedFailure, Error, FailureKind, ProtocolError, Result};
pub use export::{ExportHandle, ExportSession, Exporter, archive_file_name};
pub use fetch::{BrowseOptions, PageFetcher};
pub use types::{Event, ExportOutcome, ExportReport, ListingEntry, Page, Tag, WalkProgress};
pub use walker::{TreeWalker, WalkSummary, WalkVisitor};

/// Wait for a spawned export while honoring termination signals.
///
/// Returns the export's report. If a termination signal arrives first, the
/// export is cancelled and its (cancelled) report is returned once the
/// archive is closed.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use cds_extract::{Config, Exporter, MediaServer, http_client, join_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let client = http_client(&config.http)?;
///     let server = MediaServer::connect(&client, "http://nas.local:8200/rootDesc.xml").await?;
///     let exporter = Exporter::new(config)?;
///
///     let handle = exporter.spawn(Arc::new(server), "nas.zip".into())?;
///     let report = join_with_shutdown(handle).await?;
///     println!("{:?}", report.outcome);
///     Ok(())
/// }
/// ```
pub async fn join_with_shutdown(handle: ExportHandle) -> Result<ExportReport> {
    let token = handle.cancellation_token();
    let join = handle.join();
    tokio::pin!(join);

    tokio::select! {
        result = &mut join => return result,
        _ = wait_for_signal() => {
            tracing::info!("cancelling export after signal");
            token.cancel();
        }
    }
    join.await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
