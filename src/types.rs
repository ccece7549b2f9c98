//! Core types and events for cds-extract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::ContainedFailure;

/// Flat representation of a non-nested XML element
///
/// Holds the element name, its text value and its attributes. The
/// `item`/`container` element of a listing entry is stored with an empty value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Qualified element name as written (e.g. "dc:title")
    pub name: String,
    /// Unescaped text content
    pub value: String,
    /// Attributes by qualified name
    pub attributes: BTreeMap<String, String>,
}

impl Tag {
    /// Look up an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)?;
        for (key, value) in &self.attributes {
            write!(f, "\n@{} => {}", key, value)?;
        }
        Ok(())
    }
}

/// One child of a container, as decoded from a listing page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// UDN of the device the entry came from
    pub udn: String,
    /// Opaque object id
    pub object_id: String,
    /// Id of the containing object
    pub parent_id: String,
    /// Whether the entry is a container (has children) rather than an item
    pub is_container: bool,
    /// `dc:title`, if present
    pub title: Option<String>,
    /// `upnp:class`, if present
    pub upnp_class: Option<String>,
    /// The `item`/`container` element itself
    pub root: Tag,
    /// Child elements in document order
    pub tags: Vec<Tag>,
}

impl ListingEntry {
    /// Look up a value with a small XPath-like expression
    ///
    /// `"dc:title"` is the text of the first `dc:title` element, `"res@protocolInfo"`
    /// is an attribute of the first `res` element, and `"@id"` is an attribute of
    /// the `item`/`container` element itself.
    pub fn value(&self, xpath: &str) -> Option<&str> {
        self.value_at(xpath, 0)
    }

    /// Like [`value`](Self::value) but for the `index`-th element with that name
    pub fn value_at(&self, xpath: &str, index: usize) -> Option<&str> {
        let (tag_name, attr_name) = match xpath.split_once('@') {
            Some((tag, attr)) => (tag, Some(attr)),
            None => (xpath, None),
        };
        if tag_name.is_empty() {
            return match (attr_name, index) {
                (Some(attr), 0) => self.root.attribute(attr),
                _ => None,
            };
        }
        let tag = self.tags.iter().filter(|t| t.name == tag_name).nth(index)?;
        match attr_name {
            Some(attr) => tag.attribute(attr),
            None => Some(tag.value.as_str()),
        }
    }

    /// All child elements with the given name, in document order
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.tags.iter().filter(move |t| t.name == name)
    }
}

/// One server response to one paginated Browse call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    /// Container the page belongs to
    pub container_id: String,
    /// Decoded entries, in server order
    pub entries: Vec<ListingEntry>,
    /// Offset of the first entry in the full listing
    pub start: u32,
    /// Number of entries returned
    pub count: u32,
    /// Total size of the listing declared by the server at fetch time
    pub total: u32,
    /// Verbatim `Result` payload of the response
    pub raw: String,
}

impl Page {
    /// Index of the last entry in this page (inclusive)
    pub fn end(&self) -> u32 {
        (self.start + self.count).saturating_sub(1)
    }

    /// Whether this single page holds the container's entire listing
    pub fn covers_whole_listing(&self) -> bool {
        self.start == 0 && self.count == self.total
    }

    /// Containers among this page's entries
    pub fn containers(&self) -> impl Iterator<Item = &ListingEntry> {
        self.entries.iter().filter(|e| e.is_container)
    }
}

/// Traversal progress: containers fully dequeued versus containers discovered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkProgress {
    /// Containers taken off the queue so far
    pub visited: u64,
    /// Containers known so far (including the root)
    pub discovered: u64,
}

impl WalkProgress {
    /// Fraction visited, in 0.0..=1.0
    pub fn fraction(&self) -> f64 {
        if self.discovered == 0 {
            return 0.0;
        }
        self.visited as f64 / self.discovered as f64
    }
}

impl std::fmt::Display for WalkProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.visited, self.discovered)
    }
}

/// How an export run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportOutcome {
    /// The whole hierarchy was traversed and the archive closed
    Completed,
    /// The run was cancelled; the archive was closed with partial content
    Cancelled,
}

/// Summary of one export run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportReport {
    /// Terminal state
    pub outcome: ExportOutcome,
    /// Device friendly name
    pub device: String,
    /// Archive file written
    pub archive: PathBuf,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the archive was closed
    pub finished_at: DateTime<Utc>,
    /// Containers taken off the traversal queue
    pub containers_visited: u64,
    /// Containers discovered (including the root)
    pub containers_discovered: u64,
    /// Listing pages written to the archive
    pub pages_archived: u64,
    /// Archive entries written (descriptions and pages)
    pub entries_written: u64,
    /// Failures absorbed during the run
    pub failures: Vec<ContainedFailure>,
}

impl ExportReport {
    /// Whether the run finished without absorbing any failure
    pub fn is_clean(&self) -> bool {
        self.outcome == ExportOutcome::Completed && self.failures.is_empty()
    }
}

/// Event emitted during an export
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Export started
    ExportStarted {
        /// Device friendly name
        device: String,
        /// Archive being written
        archive: PathBuf,
    },

    /// A device or service description was archived
    DescriptionWritten {
        /// Archive path of the entry
        path: String,
    },

    /// A listing page was archived
    PageArchived {
        /// Container the page belongs to
        container_id: String,
        /// Archive path of the entry
        path: String,
        /// Offset of the first entry
        start: u32,
        /// Number of entries
        count: u32,
        /// Declared listing size
        total: u32,
    },

    /// Traversal progress after a page
    Progress {
        /// Containers visited
        visited: u64,
        /// Containers discovered
        discovered: u64,
    },

    /// Paging through a container stopped on an error; traversal continues
    ContainerFailed {
        /// Container id
        container_id: String,
        /// Error message
        error: String,
    },

    /// An archive entry could not be written and was skipped
    EntrySkipped {
        /// Archive path of the entry
        path: String,
        /// Error message
        error: String,
    },

    /// Export finished and the archive is closed
    ExportComplete {
        /// Run summary
        report: ExportReport,
    },

    /// Export was cancelled; the archive is closed with partial content
    ExportCancelled {
        /// Run summary
        report: ExportReport,
    },

    /// Export did not complete
    ExportFailed {
        /// Error message
        error: String,
    },
}
