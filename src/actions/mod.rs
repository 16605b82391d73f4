//! File actions module.
//!
//! # Linking
//!
//! The link module replaces duplicate copies with hardlinks to their origin:
//! - Device, mode and ownership checks before touching anything
//! - Rename to a temporary sibling, link, then remove the temporary
//! - Rollback to the original file if the link cannot be created
//! - Best-effort batches that continue past individual failures
//!
//! ```no_run
//! use dupelink::actions::link::Linker;
//! use dupelink::signal::CancelToken;
//! use std::path::Path;
//!
//! let linker = Linker::new(CancelToken::new());
//! let outcome = linker.link_pair(Path::new("/data/a.iso"), Path::new("/data/b.iso"), 4096);
//! ```

pub mod link;

// Re-export commonly used types
pub use link::{BatchLinkResult, FsOps, LinkError, LinkOps, LinkOutcome, Linker};
