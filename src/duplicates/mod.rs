//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Stage keys and their spill encoding ([`key`])
//! - External stable sorting of `(key, path)` records ([`spill`])
//! - Contiguous-run grouping and confirmed duplicate groups ([`groups`])
//! - The size, partial-hash and full-hash funnel ([`finder`])

pub mod finder;
pub mod groups;
pub mod key;
pub mod spill;

pub use finder::{confirm_members, DuplicateFinder, FinderConfig, FinderError, Member, ScanStats};
pub use groups::{group_by, Group, Groups, MatchGroup};
pub use key::{CandidateKey, SpillKey};
pub use spill::{
    SortedSpill, SpillConfig, SpillError, SpillWriter, DEFAULT_MERGE_FAN_IN, DEFAULT_RUN_RECORDS,
};
