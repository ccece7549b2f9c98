//! Archive layout: collision-free entry paths and the zip writer
//!
//! - [`paths`] - Path canonicalization and per-run [`PathRegistry`]
//! - [`writer`] - [`ArchiveWriter`] with per-entry failure containment

mod paths;
mod writer;

pub use paths::{PathRegistry, canonicalize, range_suffix};
pub use writer::{ArchiveWriter, WriteOutcome};
