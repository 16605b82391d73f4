//! Hardlink replacement of duplicate copies.
//!
//! # Overview
//!
//! For every copy in a [`MatchGroup`] the linker:
//! 1. checks that copy and origin share device, mode, owner and group, and
//!    that the copy still has the scanned size;
//! 2. renames the copy to `<name>~` in the same directory;
//! 3. creates a hardlink from the origin at the copy's path;
//! 4. removes the temporary.
//!
//! If step 3 fails the temporary is renamed back, so the copy's path always
//! names either its original content or the new link. Failures are per file:
//! the batch carries on with the next copy.
//!
//! Cancellation is checked before each copy, never between steps 2 and 4.
//!
//! # Example
//!
//! ```no_run
//! use dupelink::actions::link::Linker;
//! use dupelink::duplicates::{DuplicateFinder, FinderConfig};
//! use dupelink::signal::CancelToken;
//! use std::path::PathBuf;
//!
//! let cancel = CancelToken::new();
//! let finder = DuplicateFinder::new(FinderConfig::default().with_cancel_token(cancel.clone()));
//! let (groups, _) = finder.find_duplicates(&[PathBuf::from("/srv")]).unwrap();
//!
//! let linker = Linker::new(cancel);
//! let result = linker.link_groups(&groups).unwrap();
//! println!("{}", result.summary());
//! ```

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::duplicates::MatchGroup;
use crate::progress::ProgressCallback;
use crate::scanner::FileIdentity;
use crate::signal::{CancelToken, Interrupted};

/// Suffix appended to a copy's file name while it is being replaced.
pub const TEMP_SUFFIX: &str = "~";

/// Error type for linking operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Copy and origin are on different filesystems.
    #[error("{path} is on device {device}, origin is on {origin_device}")]
    CrossDevice {
        /// The copy
        path: PathBuf,
        /// Device of the copy
        device: u64,
        /// Device of the origin
        origin_device: u64,
    },

    /// Mode, owner or group differ from the origin.
    #[error("permissions or ownership of {0} differ from origin")]
    AccessMismatch(PathBuf),

    /// The file's size changed since the scan.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// The temporary sibling name is taken.
    #[error("temporary path already exists: {0}")]
    TempExists(PathBuf),

    /// The copy could not be moved aside; nothing was changed.
    #[error("cannot rename {path}: {source}")]
    Rename {
        /// The copy
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The link could not be created; the copy was restored.
    #[error("cannot create link {path}: {source}")]
    Link {
        /// The copy
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The link failed and the copy could not be restored from its temporary.
    #[error("cannot restore {path} from {temp}: {source}")]
    Rollback {
        /// The copy
        path: PathBuf,
        /// Where the original content now lives
        temp: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl LinkError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::AccessMismatch(p)
            | Self::Modified(p)
            | Self::TempExists(p)
            | Self::CrossDevice { path: p, .. }
            | Self::Rename { path: p, .. }
            | Self::Link { path: p, .. }
            | Self::Rollback { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    /// Whether the pairing was refused before anything was touched.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::CrossDevice { .. }
                | Self::AccessMismatch(_)
                | Self::Modified(_)
                | Self::TempExists(_)
        )
    }
}

/// What happened to a single copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The copy now shares the origin's inode.
    Linked {
        /// Bytes reclaimed
        bytes: u64,
    },
    /// The copy already shared the origin's inode.
    AlreadyLinked,
}

/// Results of linking a batch of groups.
///
/// Counts are always kept. Per-copy paths are only kept when `keep_paths`
/// is set, so a streaming run that only reports totals stays O(1) in memory.
#[derive(Debug, Clone)]
pub struct BatchLinkResult {
    /// Copies replaced by a link (only filled when `keep_paths`).
    pub linked: Vec<PathBuf>,
    /// Number of copies replaced.
    pub linked_files: usize,
    /// Copies that already were links to their origin.
    pub already_linked: usize,
    /// Pairings refused by a precondition, with the reason (only filled when `keep_paths`).
    pub skipped: Vec<(PathBuf, String)>,
    /// Number of pairings refused by a precondition.
    pub skipped_files: usize,
    /// Pairings that failed mid-protocol, with the error (only filled when `keep_paths`).
    pub failures: Vec<(PathBuf, String)>,
    /// Number of pairings that failed mid-protocol.
    pub failed_files: usize,
    /// Total bytes reclaimed.
    pub bytes_saved: u64,
    /// Whether per-copy paths are recorded.
    pub keep_paths: bool,
}

impl Default for BatchLinkResult {
    fn default() -> Self {
        Self {
            linked: Vec::new(),
            linked_files: 0,
            already_linked: 0,
            skipped: Vec::new(),
            skipped_files: 0,
            failures: Vec::new(),
            failed_files: 0,
            bytes_saved: 0,
            keep_paths: true,
        }
    }
}

impl BatchLinkResult {
    /// A result that keeps counts but no per-copy paths.
    #[must_use]
    pub fn counts_only() -> Self {
        Self {
            keep_paths: false,
            ..Self::default()
        }
    }

    /// Number of copies replaced.
    #[must_use]
    pub fn linked_count(&self) -> usize {
        self.linked_files
    }

    /// Number of pairings refused by a precondition.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped_files
    }

    /// Number of failed pairings.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed_files
    }

    /// Check if every attempted pairing succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed_files == 0
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Linked {} file(s), saved {} bytes",
            self.linked_count(),
            self.bytes_saved
        );
        if self.skipped_files > 0 {
            summary.push_str(&format!(", {} skipped", self.skipped_files));
        }
        if self.failed_files > 0 {
            summary.push_str(&format!(", {} failed", self.failed_files));
        }
        summary
    }

    fn record(&mut self, copy: &Path, result: Result<LinkOutcome, LinkError>) {
        match result {
            Ok(LinkOutcome::Linked { bytes }) => {
                self.bytes_saved += bytes;
                self.linked_files += 1;
                if self.keep_paths {
                    self.linked.push(copy.to_path_buf());
                }
            }
            Ok(LinkOutcome::AlreadyLinked) => {
                log::debug!("{} is already linked to its origin", copy.display());
                self.already_linked += 1;
            }
            Err(e) if e.is_precondition() => {
                log::debug!("Skipping {}: {}", copy.display(), e);
                self.skipped_files += 1;
                if self.keep_paths {
                    self.skipped.push((copy.to_path_buf(), e.to_string()));
                }
            }
            Err(e) => {
                log::warn!("{}", e);
                self.failed_files += 1;
                if self.keep_paths {
                    self.failures.push((copy.to_path_buf(), e.to_string()));
                }
            }
        }
    }
}

/// Filesystem primitives used by the replacement protocol.
pub trait LinkOps {
    /// Rename `from` to `to`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create `link` as a hardlink to `original`.
    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;

    /// Remove the file at `path`.
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`LinkOps`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOps;

impl LinkOps for FsOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        fs::hard_link(original, link)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Replaces duplicate copies with hardlinks to their origin.
pub struct Linker<O: LinkOps = FsOps> {
    ops: O,
    cancel: CancelToken,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl Linker<FsOps> {
    /// Create a linker operating on the real filesystem.
    #[must_use]
    pub fn new(cancel: CancelToken) -> Self {
        Self::with_ops(FsOps, cancel)
    }
}

impl<O: LinkOps> Linker<O> {
    /// Create a linker with custom filesystem primitives.
    #[must_use]
    pub fn with_ops(ops: O, cancel: CancelToken) -> Self {
        Self {
            ops,
            cancel,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Link every copy of every group, best effort.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] if cancellation was requested. Copies handled
    /// before that point stay linked.
    pub fn link_groups(&self, groups: &[MatchGroup]) -> Result<BatchLinkResult, Interrupted> {
        let total = groups.iter().map(|g| g.copies().len()).sum();
        if let Some(ref cb) = self.progress_callback {
            cb.on_phase_start("linking", total);
        }

        let mut result = BatchLinkResult::default();
        let outcome = groups
            .iter()
            .try_for_each(|group| self.link_group(group, &mut result));

        if let Some(ref cb) = self.progress_callback {
            cb.on_phase_end("linking");
        }
        outcome?;

        log::info!("{}", result.summary());
        Ok(result)
    }

    /// Link each copy of `group` to its origin, accumulating into `result`.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] if cancellation was requested before a copy.
    pub fn link_group(
        &self,
        group: &MatchGroup,
        result: &mut BatchLinkResult,
    ) -> Result<(), Interrupted> {
        let origin = group.origin();
        for copy in group.copies() {
            self.cancel.check()?;
            let outcome = self.link_pair(origin, copy, group.size);
            result.record(copy, outcome);
            if let Some(ref cb) = self.progress_callback {
                cb.on_progress(result.linked_files + result.already_linked, &copy.to_string_lossy());
            }
        }
        Ok(())
    }

    /// Replace `copy` with a hardlink to `origin`.
    ///
    /// # Errors
    ///
    /// Precondition errors leave both files untouched. [`LinkError::Link`]
    /// means the copy was restored; [`LinkError::Rollback`] means its content
    /// is still at the temporary path.
    pub fn link_pair(&self, origin: &Path, copy: &Path, size: u64) -> Result<LinkOutcome, LinkError> {
        let origin_meta = stat(origin)?;
        let copy_meta = stat(copy)?;

        if let (Some(o), Some(c)) = (
            FileIdentity::from_metadata(&origin_meta),
            FileIdentity::from_metadata(&copy_meta),
        ) {
            if o.same_object(&c) {
                return Ok(LinkOutcome::AlreadyLinked);
            }
            if o.device != c.device {
                return Err(LinkError::CrossDevice {
                    path: copy.to_path_buf(),
                    device: c.device,
                    origin_device: o.device,
                });
            }
            if !o.same_access(&c) {
                return Err(LinkError::AccessMismatch(copy.to_path_buf()));
            }
        }

        if origin_meta.len() != size {
            return Err(LinkError::Modified(origin.to_path_buf()));
        }
        if copy_meta.len() != size {
            return Err(LinkError::Modified(copy.to_path_buf()));
        }

        let temp = temp_path(copy).ok_or_else(|| LinkError::NotFound(copy.to_path_buf()))?;
        if fs::symlink_metadata(&temp).is_ok() {
            return Err(LinkError::TempExists(temp));
        }

        self.ops.rename(copy, &temp).map_err(|source| LinkError::Rename {
            path: copy.to_path_buf(),
            source,
        })?;

        if let Err(source) = self.ops.hard_link(origin, copy) {
            return match self.ops.rename(&temp, copy) {
                Ok(()) => Err(LinkError::Link {
                    path: copy.to_path_buf(),
                    source,
                }),
                Err(restore) => {
                    log::error!(
                        "Cannot restore {} after failed link ({}); content is at {}",
                        copy.display(),
                        source,
                        temp.display()
                    );
                    Err(LinkError::Rollback {
                        path: copy.to_path_buf(),
                        temp,
                        source: restore,
                    })
                }
            };
        }

        if let Err(e) = self.ops.remove_file(&temp) {
            log::warn!("Linked {} but cannot remove {}: {}", copy.display(), temp.display(), e);
        }

        log::debug!("Linked {} -> {}", copy.display(), origin.display());
        Ok(LinkOutcome::Linked { bytes: size })
    }
}

/// Sibling path used while `copy` is being replaced.
#[must_use]
pub fn temp_path(copy: &Path) -> Option<PathBuf> {
    let mut name: OsString = copy.file_name()?.to_os_string();
    name.push(TEMP_SUFFIX);
    Some(copy.with_file_name(name))
}

fn stat(path: &Path) -> Result<fs::Metadata, LinkError> {
    fs::metadata(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            LinkError::NotFound(path.to_path_buf())
        } else {
            LinkError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
