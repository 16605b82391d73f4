//! Scanner module for directory enumeration and file hashing.
//!
//! This module provides:
//! - Depth-first enumeration of one or more root folders ([`walker`])
//! - Device and inode identity tracking ([`hardlink`])
//! - Partial and full BLAKE3 content digests ([`hasher`])
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{Walker, WalkerConfig};
//! use dupelink::signal::CancelToken;
//! use std::path::PathBuf;
//!
//! let config = WalkerConfig {
//!     minimal_size: 1024, // Only files strictly larger than 1 KiB
//!     ..Default::default()
//! };
//!
//! let mut walker = Walker::new(vec![PathBuf::from(".")], config, CancelToken::new());
//! for record in walker.records() {
//!     match record {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Stopped: {}", e),
//!     }
//! }
//! ```

pub mod hardlink;
pub mod hasher;
pub mod walker;

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use hardlink::{FileIdentity, IdentityTracker};
pub use hasher::{Digest, Hasher, HasherConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PARTIAL_WINDOW};
pub use walker::{WalkCounters, Walker};

/// A file selected by the enumerator.
///
/// Immutable once produced. Two records sharing `(device_id, inode_id)` are
/// the same on-disk object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path as discovered under its root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Device holding the file
    pub device_id: u64,
    /// Inode number on that device
    pub inode_id: u64,
}

impl FileRecord {
    /// Create a new file record.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, device_id: u64, inode_id: u64) -> Self {
        Self {
            path,
            size,
            device_id,
            inode_id,
        }
    }
}

/// How files whose inode was already visited are treated.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LinkPolicy {
    /// Count the file as "already linked" and do not yield it.
    #[default]
    Skip,
    /// Yield the file so existing links show up in the report; the linker
    /// leaves members that already share the origin's inode alone.
    Report,
}

/// Configuration for directory enumeration.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Only files with `size > minimal_size` are yielded.
    pub minimal_size: u64,

    /// Follow symbolic links during traversal.
    pub follow_links: bool,

    /// Directory names that are never descended into.
    pub blacklist: HashSet<OsString>,

    /// Treatment of files whose inode was already visited.
    pub existing_links: LinkPolicy,
}

impl WalkerConfig {
    /// Set the minimal size threshold (exclusive).
    #[must_use]
    pub fn with_minimal_size(mut self, size: u64) -> Self {
        self.minimal_size = size;
        self
    }

    /// Enable or disable symlink following.
    #[must_use]
    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Set the blacklisted directory names.
    #[must_use]
    pub fn with_blacklist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.blacklist = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the policy for already-linked files.
    #[must_use]
    pub fn with_existing_links(mut self, policy: LinkPolicy) -> Self {
        self.existing_links = policy;
        self
    }
}

/// Errors that can occur while enumerating a root folder.
///
/// Per-file problems are diagnostics, not errors; only conditions that stop
/// the whole walk surface here.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The specified root was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The walk observed a cancellation request.
    #[error(transparent)]
    Interrupted(#[from] crate::signal::Interrupted),
}
