//! Paginated enumeration of one container's listing
//!
//! [`PageFetcher`] is pull-based: every [`next_page`](PageFetcher::next_page)
//! call issues at most one Browse request, so a consumer that stops pulling
//! never triggers another remote call. The fetcher is fused: once it has
//! returned `None` or an error it stays finished.

use crate::config::ExportConfig;
use crate::control::{BrowseAction, BrowseRequest};
use crate::didl::ResponseDecoder;
use crate::error::{ProtocolError, Result};
use crate::types::Page;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Maximum entries requested per Browse call unless configured otherwise
pub const DEFAULT_CHUNK_SIZE: u32 = 10;

/// Browse arguments shared by every page of a fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseOptions {
    /// Property filter
    pub filter: String,
    /// Sort criteria
    pub sort_criteria: String,
    /// Offset the fetch starts at
    pub starting_index: u32,
    /// Total number of entries wanted; 0 means no limit
    pub requested_count: u32,
    /// Per-call cap on requested entries
    pub chunk_size: u32,
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            filter: "*".to_string(),
            sort_criteria: String::new(),
            starting_index: 0,
            requested_count: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl From<&ExportConfig> for BrowseOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            filter: config.filter.clone(),
            sort_criteria: config.sort_criteria.clone(),
            starting_index: 0,
            requested_count: 0,
            chunk_size: config.chunk_size,
        }
    }
}

/// Lazy sequence of [`Page`]s for one container
pub struct PageFetcher<'a> {
    action: &'a dyn BrowseAction,
    decoder: &'a dyn ResponseDecoder,
    udn: &'a str,
    container_id: String,
    options: BrowseOptions,
    requested: u32,
    start: u32,
    calls: u32,
    cancel: CancellationToken,
    finished: bool,
    cancelled: bool,
}

impl<'a> PageFetcher<'a> {
    /// Create a fetcher; no call is made until the first page is pulled
    pub fn new(
        action: &'a dyn BrowseAction,
        decoder: &'a dyn ResponseDecoder,
        udn: &'a str,
        container_id: &str,
        options: BrowseOptions,
        cancel: CancellationToken,
    ) -> Self {
        let requested = match options.requested_count {
            0 => u32::MAX,
            n => n,
        };
        Self {
            action,
            decoder,
            udn,
            container_id: container_id.to_string(),
            start: options.starting_index,
            options,
            requested,
            calls: 0,
            cancel,
            finished: false,
            cancelled: false,
        }
    }

    /// Container being fetched
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Offset the next call will start at
    pub fn cursor(&self) -> u32 {
        self.start
    }

    /// Number of Browse calls issued so far
    pub fn calls(&self) -> u32 {
        self.calls
    }

    /// Whether the sequence has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the sequence ended on the cancellation token rather than the
    /// end of the listing
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Fetch the next page
    ///
    /// Returns `None` when the listing is exhausted, the server signals the end
    /// with a zero count or total, or the cancellation token has fired. A
    /// transport failure or inconsistent response is returned once as an
    /// error and ends the sequence.
    pub async fn next_page(&mut self) -> Option<Result<Page>> {
        if self.finished {
            return None;
        }
        if self.cancel.is_cancelled() {
            debug!(container_id = %self.container_id, "fetch cancelled");
            self.finished = true;
            self.cancelled = true;
            return None;
        }
        if self.start >= self.requested {
            self.finished = true;
            return None;
        }

        let request = BrowseRequest {
            object_id: self.container_id.clone(),
            filter: self.options.filter.clone(),
            sort_criteria: self.options.sort_criteria.clone(),
            starting_index: self.start,
            requested_count: (self.requested - self.start).min(self.options.chunk_size),
        };
        self.calls += 1;
        let result = self.action.browse(&request).await;
        let page = result.and_then(|response| {
            let number = response.number_returned;
            let total = response.total_matches;
            if number == 0 || total == 0 {
                return Ok(None);
            }
            let entries = self.decoder.decode(self.udn, &response.result);
            self.check(number, total, entries.len())?;
            Ok(Some(Page {
                container_id: self.container_id.clone(),
                entries,
                start: self.start,
                count: number as u32,
                total: total as u32,
                raw: response.result,
            }))
        });

        match page {
            Ok(Some(page)) => {
                debug!(
                    container_id = %self.container_id,
                    start = page.start,
                    count = page.count,
                    total = page.total,
                    "fetched page"
                );
                self.start = self.start.saturating_add(page.count);
                if self.start >= page.total || self.start >= self.requested {
                    self.finished = true;
                }
                Some(Ok(page))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    fn check(&self, number: i64, total: i64, decoded: usize) -> Result<()> {
        let container = || self.container_id.clone();
        if number < 0 || total < 0 {
            return Err(ProtocolError::NegativeCount {
                container: container(),
                count: number,
                total,
            }
            .into());
        }
        if decoded == 0 {
            return Err(ProtocolError::EmptyPage {
                container: container(),
                count: number,
            }
            .into());
        }
        if number > i64::from(u32::MAX) || total > i64::from(u32::MAX) {
            return Err(ProtocolError::Malformed {
                container: container(),
                reason: format!("counts out of range (count={}, total={})", number, total),
            }
            .into());
        }
        if decoded as i64 != number {
            return Err(ProtocolError::CountMismatch {
                container: container(),
                declared: number,
                decoded,
            }
            .into());
        }
        Ok(())
    }

    /// Adapt the fetcher into a [`Stream`] of pages
    pub fn into_stream(self) -> impl Stream<Item = Result<Page>> + 'a {
        futures::stream::unfold(self, |mut fetcher| async move {
            fetcher.next_page().await.map(|page| (page, fetcher))
        })
    }
}
