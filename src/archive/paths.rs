//! Collision-free archive path allocation

use crate::error::{Error, Result};
use std::collections::HashSet;
use tracing::debug;

/// Characters that may not appear in an archive path component
const ILLEGAL_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replace characters that are illegal in file paths with `_`
///
/// ```
/// use cds_extract::archive::canonicalize;
///
/// assert_eq!(canonicalize("Living Room: NAS"), "Living Room_ NAS");
/// assert_eq!(canonicalize("a/b\\c"), "a_b_c");
/// ```
pub fn canonicalize(name: &str) -> String {
    name.chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Suffix marking the `[start, end]` entry range of a partial listing page
///
/// ```
/// use cds_extract::archive::range_suffix;
///
/// assert_eq!(range_suffix(10, 19, ".xml"), "(10-19).xml");
/// ```
pub fn range_suffix(start: u32, end: u32, extension: &str) -> String {
    format!("({}-{}){}", start, end, extension)
}

/// Set of archive paths handed out during one export run
///
/// A path is never returned twice. When the natural candidate
/// `base/entity suffix` is taken, `$0`, `$1`, ... are inserted before the
/// suffix until a free one is found.
#[derive(Debug, Clone)]
pub struct PathRegistry {
    allocated: HashSet<String>,
    probe_limit: u32,
}

impl Default for PathRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PathRegistry {
    /// Registry that may probe the whole `u32` counter space
    pub fn new() -> Self {
        Self::with_probe_limit(u32::MAX)
    }

    /// Registry that gives up after `probe_limit` collision suffixes
    pub fn with_probe_limit(probe_limit: u32) -> Self {
        Self {
            allocated: HashSet::new(),
            probe_limit,
        }
    }

    /// Allocate a unique path for `entity` under `base`
    ///
    /// `entity` is canonicalized; `base` and `suffix` are used as given.
    /// Returns [`Error::Allocation`] once every collision suffix is taken.
    pub fn allocate(&mut self, base: &str, entity: &str, suffix: &str) -> Result<String> {
        let stem = format!("{}/{}", base, canonicalize(entity));
        let candidate = format!("{}{}", stem, suffix);
        if self.allocated.insert(candidate.clone()) {
            debug!(path = %candidate, "allocated archive path");
            return Ok(candidate);
        }

        for i in 0..self.probe_limit {
            let probe = format!("{}${}{}", stem, i, suffix);
            if self.allocated.insert(probe.clone()) {
                debug!(path = %probe, collisions = i + 1, "allocated archive path after collision");
                return Ok(probe);
            }
        }
        Err(Error::Allocation { path: candidate })
    }

    /// Whether `path` has already been handed out
    pub fn contains(&self, path: &str) -> bool {
        self.allocated.contains(path)
    }

    /// Number of paths handed out
    pub fn len(&self) -> usize {
        self.allocated.len()
    }

    /// Whether no path has been handed out yet
    pub fn is_empty(&self) -> bool {
        self.allocated.is_empty()
    }

    /// Forget every allocation
    pub fn clear(&mut self) {
        self.allocated.clear();
    }
}
