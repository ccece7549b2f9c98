//! Breadth-first traversal of a content directory
//!
//! [`TreeWalker`] keeps a FIFO of pending container ids seeded with the root.
//! Each popped container is paged to exhaustion with a [`PageFetcher`]; child
//! containers found on a page are appended to the tail, so containers are
//! visited in discovery order. A failing container is recorded and skipped,
//! while an error from the visitor ends the walk.
//!
//! [`PageFetcher`]: crate::fetch::PageFetcher

use crate::device::MediaServer;
use crate::error::{Error, Result};
use crate::fetch::BrowseOptions;
use crate::types::{Page, WalkProgress};
use std::collections::{HashSet, VecDeque};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Receives every page produced during a walk
pub trait WalkVisitor {
    /// Handle one page; an error aborts the whole walk
    fn on_page(&mut self, page: &Page, progress: WalkProgress) -> Result<()>;

    /// Called when paging through a container stopped on an error
    fn on_container_failed(&mut self, _container_id: &str, _error: &Error) {}
}

impl<F> WalkVisitor for F
where
    F: FnMut(&Page, WalkProgress) -> Result<()>,
{
    fn on_page(&mut self, page: &Page, progress: WalkProgress) -> Result<()> {
        self(page, progress)
    }
}

/// What a finished walk saw
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Containers taken off the queue
    pub visited: u64,
    /// Containers discovered, including the root
    pub discovered: u64,
    /// Pages handed to the visitor
    pub pages: u64,
    /// Whether the walk stopped because of cancellation
    pub cancelled: bool,
    /// Containers whose paging stopped on an error
    pub failed: u64,
}

impl WalkSummary {
    /// Final progress figures
    pub fn progress(&self) -> WalkProgress {
        WalkProgress {
            visited: self.visited,
            discovered: self.discovered,
        }
    }
}

/// Breadth-first walker over one media server
pub struct TreeWalker<'a> {
    server: &'a MediaServer,
    options: BrowseOptions,
    cancel: CancellationToken,
    queue: VecDeque<String>,
    seen: HashSet<String>,
}

impl<'a> TreeWalker<'a> {
    /// Create a walker; `options` applies to every container
    pub fn new(server: &'a MediaServer, options: BrowseOptions, cancel: CancellationToken) -> Self {
        Self {
            server,
            options,
            cancel,
            queue: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    fn progress(&self) -> WalkProgress {
        let discovered = self.seen.len() as u64;
        WalkProgress {
            visited: discovered - self.queue.len() as u64,
            discovered,
        }
    }

    fn enqueue(&mut self, container_id: &str) -> bool {
        if !self.seen.insert(container_id.to_string()) {
            return false;
        }
        self.queue.push_back(container_id.to_string());
        true
    }

    /// Walk the hierarchy under `root_id`, handing every page to `visitor`
    ///
    /// Cancellation is checked before each container is taken off the queue
    /// and by the fetcher before each page; a page already being fetched is
    /// allowed to finish. A walk whose queue drained reports itself complete
    /// even if the token fired during the last page.
    pub async fn walk<V>(mut self, root_id: &str, visitor: &mut V) -> Result<WalkSummary>
    where
        V: WalkVisitor + ?Sized,
    {
        let server = self.server;
        self.enqueue(root_id);
        let mut summary = WalkSummary::default();

        while let Some(container_id) = self.queue.pop_front() {
            if self.cancel.is_cancelled() {
                self.queue.push_front(container_id);
                debug!(pending = self.queue.len(), "walk cancelled");
                summary.cancelled = true;
                break;
            }
            debug!(container_id = %container_id, progress = %self.progress(), "visiting container");

            let mut fetcher = server.browse(&container_id, self.options.clone(), self.cancel.clone());
            while let Some(next) = fetcher.next_page().await {
                let page = match next {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(container_id = %container_id, error = %e, "skipping rest of container");
                        visitor.on_container_failed(&container_id, &e);
                        summary.failed += 1;
                        break;
                    }
                };

                for child in page.containers() {
                    if !self.enqueue(&child.object_id) {
                        debug!(
                            container_id = %child.object_id,
                            parent_id = %container_id,
                            "container already queued"
                        );
                    }
                }
                summary.pages += 1;
                visitor.on_page(&page, self.progress())?;
            }

            if fetcher.was_cancelled() {
                debug!(container_id = %container_id, pending = self.queue.len(), "walk cancelled mid-container");
                summary.cancelled = true;
                break;
            }
        }

        let progress = self.progress();
        summary.visited = progress.visited;
        summary.discovered = progress.discovered;
        Ok(summary)
    }
}
