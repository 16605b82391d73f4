//! File identity and inode-alias tracking.
//!
//! # Overview
//!
//! Hardlinks are multiple directory entries pointing to the same inode. They
//! share content but are the same data object, so they must not be counted
//! as found duplicates. Hardlinks also cannot cross filesystems, so every
//! file on a device other than the first one seen is useless work.
//!
//! [`IdentityTracker`] enforces both rules during enumeration:
//! - the device of the first identified file becomes the scan's device;
//! - each `(device, inode)` pair is remembered so later aliases are flagged.
//!
//! # Platform Support
//!
//! - **Unix**: identity comes from `st_dev`, `st_ino`, `st_mode`, `st_uid`, `st_gid`
//! - **Other**: no identity is available; tracking is disabled
//!
//! # Example
//!
//! ```
//! use dupelink::scanner::hardlink::{FileIdentity, IdentityTracker};
//!
//! let mut tracker = IdentityTracker::new();
//! let a = FileIdentity { device: 1, inode: 10, mode: 0o100644, uid: 0, gid: 0 };
//! let b = FileIdentity { inode: 11, ..a };
//!
//! assert_eq!(tracker.check_device(a.device), Ok(()));
//! assert!(tracker.record(&a));
//! assert!(tracker.record(&b));
//! assert!(!tracker.record(&a));
//! assert_eq!(tracker.check_device(2), Err(1));
//! ```

use std::collections::HashSet;
use std::fs::Metadata;

/// On-disk identity and ownership of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    /// Device id (`st_dev`)
    pub device: u64,
    /// Inode number (`st_ino`)
    pub inode: u64,
    /// Mode bits including file type (`st_mode`)
    pub mode: u32,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
}

impl FileIdentity {
    /// Extract the identity from file metadata.
    ///
    /// Returns `None` on platforms without inode information.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            device: metadata.dev(),
            inode: metadata.ino(),
            mode: metadata.mode(),
            uid: metadata.uid(),
            gid: metadata.gid(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Whether both identities name the same on-disk object.
    #[must_use]
    pub fn same_object(&self, other: &Self) -> bool {
        self.device == other.device && self.inode == other.inode
    }

    /// Whether linking `other` to `self` would leave permissions and
    /// ownership unchanged for anyone observing `other`.
    #[must_use]
    pub fn same_access(&self, other: &Self) -> bool {
        self.mode == other.mode && self.uid == other.uid && self.gid == other.gid
    }

    /// Whether identity tracking is available on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}

/// Tracks the scan device and visited inodes.
///
/// Not thread-safe; the enumerator owns exactly one.
#[derive(Debug, Default)]
pub struct IdentityTracker {
    device: Option<u64>,
    seen: HashSet<(u64, u64)>,
}

impl IdentityTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the scan device on first use, then compare against it.
    ///
    /// # Errors
    ///
    /// Returns the scan's device when `device` differs from it.
    pub fn check_device(&mut self, device: u64) -> Result<(), u64> {
        let expected = *self.device.get_or_insert(device);
        if device == expected {
            Ok(())
        } else {
            Err(expected)
        }
    }

    /// Record an inode; `false` if it was already visited.
    pub fn record(&mut self, identity: &FileIdentity) -> bool {
        self.seen.insert((identity.device, identity.inode))
    }

    /// The device fixed by the first observation, if any.
    #[must_use]
    pub fn device(&self) -> Option<u64> {
        self.device
    }

    /// Number of distinct inodes recorded.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
