//! DWARF graph provider.
//!
//! This crate wraps gimli and object behind the small surface the query
//! engine consumes: open an ELF, walk compile units and DIE trees (raw
//! physical order or the cooked, import-merged view), look up attributes,
//! abbreviations, location lists and address ranges, and answer parent
//! queries out of a per-unit cache.

pub mod graph;
pub mod walk;

pub use graph::{Graph, LoclistEntry, Reader, NONE_OFFSET};
pub use walk::{CookedDie, CookedWalk, RawWalk};

/// Result type used throughout the provider.
pub type Result<T> = anyhow::Result<T>;
