//! Directory enumerator.
//!
//! # Overview
//!
//! [`Walker`] walks a list of root folders depth-first, in order, and yields
//! a lazy, finite, non-restartable sequence of [`FileRecord`]s. Directory
//! entries are visited sorted by file name so traversal order (and therefore
//! origin selection downstream) is deterministic for a given tree.
//!
//! # Filtering rules
//!
//! - Blacklisted directory names are pruned before descent; their contents
//!   are never read.
//! - Entries that cannot be stat'ed (permission denied, broken symlink,
//!   vanished file) are skipped with a debug diagnostic.
//! - The device of the first stat'ed file fixes the scan device; files on
//!   other devices are skipped.
//! - Only regular files with `size > minimal_size` are yielded.
//! - Files whose inode was already visited are skipped or yielded depending
//!   on [`LinkPolicy`](super::LinkPolicy).
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{Walker, WalkerConfig};
//! use dupelink::signal::CancelToken;
//! use std::path::PathBuf;
//!
//! let config = WalkerConfig::default().with_blacklist([".git"]);
//! let mut walker = Walker::new(vec![PathBuf::from("/srv/media")], config, CancelToken::new());
//! let files: Vec<_> = walker.records().filter_map(Result::ok).collect();
//! println!("{} candidates, {:?}", files.len(), walker.counters());
//! ```

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::hardlink::{FileIdentity, IdentityTracker};
use super::{FileRecord, LinkPolicy, ScanError, WalkerConfig};
use crate::signal::CancelToken;

type EntryIter = Box<dyn Iterator<Item = walkdir::Result<DirEntry>>>;

/// Running counters kept by the enumerator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkCounters {
    /// Regular files successfully stat'ed
    pub files_examined: usize,
    /// Files yielded as candidates
    pub files_selected: usize,
    /// Total size of the yielded files
    pub bytes_selected: u64,
    /// Files at or below the minimal size
    pub below_threshold: usize,
    /// Files skipped because they live on another device
    pub other_device: usize,
    /// Files whose inode was already visited
    pub already_linked_files: usize,
    /// Total size of those files
    pub already_linked_bytes: u64,
    /// Entries that could not be read or stat'ed
    pub unreadable: usize,
}

/// Depth-first enumerator over one or more root folders.
#[derive(Debug)]
pub struct Walker {
    roots: Vec<PathBuf>,
    config: WalkerConfig,
    cancel: CancelToken,
    tracker: IdentityTracker,
    counters: WalkCounters,
}

impl Walker {
    /// Create a walker over `roots`, visited in the given order.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, config: WalkerConfig, cancel: CancelToken) -> Self {
        Self {
            roots,
            config,
            cancel,
            tracker: IdentityTracker::new(),
            counters: WalkCounters::default(),
        }
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn counters(&self) -> WalkCounters {
        self.counters
    }

    /// The device fixed by the first stat'ed file, if any.
    #[must_use]
    pub fn device(&self) -> Option<u64> {
        self.tracker.device()
    }

    /// Iterate over candidate records.
    ///
    /// Per-file problems are logged and skipped. The only error yielded is
    /// [`ScanError::Interrupted`] (or a missing root), after which the
    /// iterator is exhausted.
    pub fn records(&mut self) -> Records<'_> {
        Records {
            walker: self,
            next_root: 0,
            current: None,
            finished: false,
        }
    }

    /// Build the pruned, name-sorted entry stream for one root.
    fn open(&self, root: &Path) -> EntryIter {
        let blacklist = self.config.blacklist.clone();
        let iter = WalkDir::new(root)
            .follow_links(self.config.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                if blacklist.contains(entry.file_name()) {
                    log::debug!("Skipping blacklisted directory: {}", entry.path().display());
                    return false;
                }
                true
            });
        Box::new(iter)
    }

    /// Apply the filtering rules to one entry.
    fn select(&mut self, entry: DirEntry) -> Option<FileRecord> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return None;
        }
        if file_type.is_symlink() && !self.config.follow_links {
            log::trace!("Skipping symlink: {}", entry.path().display());
            return None;
        }

        // Follows symlinks only when follow_links is enabled
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                self.counters.unreadable += 1;
                log::debug!("Cannot stat {}: {}", entry.path().display(), e);
                return None;
            }
        };
        if !metadata.is_file() {
            log::trace!("Skipping non-regular file: {}", entry.path().display());
            return None;
        }
        self.counters.files_examined += 1;

        let identity = FileIdentity::from_metadata(&metadata);
        if let Some(ref id) = identity {
            if let Err(expected) = self.tracker.check_device(id.device) {
                self.counters.other_device += 1;
                log::debug!(
                    "Skipping {} (device {} differs from scan device {})",
                    entry.path().display(),
                    id.device,
                    expected
                );
                return None;
            }
        }

        let size = metadata.len();
        if size <= self.config.minimal_size {
            self.counters.below_threshold += 1;
            log::trace!("Skipping small file ({} bytes): {}", size, entry.path().display());
            return None;
        }

        if let Some(ref id) = identity {
            if !self.tracker.record(id) {
                self.counters.already_linked_files += 1;
                self.counters.already_linked_bytes += size;
                if self.config.existing_links == LinkPolicy::Skip {
                    log::debug!("Skipping already linked file: {}", entry.path().display());
                    return None;
                }
                log::debug!("Reporting already linked file: {}", entry.path().display());
            }
        }

        self.counters.files_selected += 1;
        self.counters.bytes_selected += size;

        let (device_id, inode_id) = identity.map_or((0, 0), |id| (id.device, id.inode));
        Some(FileRecord::new(entry.into_path(), size, device_id, inode_id))
    }

    fn note_walk_error(&mut self, error: walkdir::Error) {
        self.counters.unreadable += 1;
        match error.path() {
            Some(path) => log::debug!("Cannot read {}: {}", path.display(), error),
            None => log::debug!("Walk error: {}", error),
        }
    }
}

/// Lazy record stream returned by [`Walker::records`].
pub struct Records<'a> {
    walker: &'a mut Walker,
    next_root: usize,
    current: Option<EntryIter>,
    finished: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<FileRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if let Err(e) = self.walker.cancel.check() {
                log::debug!("Walker: cancellation requested, stopping");
                self.finished = true;
                return Some(Err(e.into()));
            }

            let Some(entries) = self.current.as_mut() else {
                let Some(root) = self.walker.roots.get(self.next_root).cloned() else {
                    self.finished = true;
                    return None;
                };
                self.next_root += 1;
                if !root.exists() {
                    self.finished = true;
                    return Some(Err(ScanError::NotFound(root)));
                }
                log::debug!("Walking {}", root.display());
                self.current = Some(self.walker.open(&root));
                continue;
            };

            let next = entries.next();
            match next {
                None => self.current = None,
                Some(Err(e)) => self.walker.note_walk_error(e),
                Some(Ok(entry)) => {
                    if let Some(record) = self.walker.select(entry) {
                        return Some(Ok(record));
                    }
                }
            }
        }
    }
}
