//! Duplicate finder implementation with multi-stage detection.
//!
//! # Overview
//!
//! This module orchestrates the duplicate detection pipeline. Every stage is
//! an instance of the same spill, sort and group cycle (see
//! [`crate::duplicates::groups`]):
//! 1. **Stage 1 - Size**: enumerated files keyed by size
//! 2. **Stage 2 - Partial hash**: members of size groups keyed by head/tail digest
//! 3. **Stage 3 - Full hash**: members of partial groups keyed by content digest
//!
//! Each stage's spill directory is removed as soon as the next stage has
//! consumed it. Files whose partial digest already covers their whole
//! content reuse it in stage 3 without reading the file again.
//!
//! Stage 3 groups go through [`confirm_members`] before they become
//! [`MatchGroup`]s: members on another device than the origin, members whose
//! size changed, and members that are the origin itself under another name
//! are dropped.
//!
//! # Example
//!
//! ```no_run
//! use dupelink::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::PathBuf;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default());
//! let (groups, stats) = finder.find_duplicates(&[PathBuf::from(".")]).unwrap();
//!
//! println!("Found {} duplicate groups", groups.len());
//! println!("Wasted: {} bytes", stats.wasted_bytes);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::groups::{Groups, MatchGroup};
use super::key::CandidateKey;
use super::spill::{SpillConfig, SpillError, SpillWriter};
use crate::progress::ProgressCallback;
use crate::scanner::{
    Digest, FileIdentity, Hasher, HasherConfig, LinkPolicy, ScanError, WalkCounters, Walker,
    WalkerConfig,
};
use crate::signal::{CancelToken, Interrupted};

/// Configuration for the duplicate finder.
#[derive(Clone, Default)]
pub struct FinderConfig {
    /// Enumeration rules.
    pub walker: WalkerConfig,
    /// Hash windows and chunk size.
    pub hasher: HasherConfig,
    /// Spill location and run size.
    pub spill: SpillConfig,
    /// Cancellation token checked throughout the scan.
    pub cancel: CancelToken,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("walker", &self.walker)
            .field("hasher", &self.hasher)
            .field("spill", &self.spill)
            .field("cancel", &self.cancel)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl FinderConfig {
    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker = config;
        self
    }

    /// Set the hasher configuration.
    #[must_use]
    pub fn with_hasher_config(mut self, config: HasherConfig) -> Self {
        self.hasher = config;
        self
    }

    /// Set the spill configuration.
    #[must_use]
    pub fn with_spill_config(mut self, config: SpillConfig) -> Self {
        self.spill = config;
        self
    }

    /// Set the cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Counters accumulated over one scan. Read-only once the scan returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    /// Regular files stat'ed by the enumerator
    pub files_examined: usize,
    /// Files passed to the pipeline
    pub files_selected: usize,
    /// Total size of the selected files
    pub bytes_selected: u64,
    /// Files at or below the minimal size
    pub below_threshold: usize,
    /// Files skipped for living on another device
    pub other_device: usize,
    /// Files whose inode was already visited
    pub already_linked_files: usize,
    /// Size of those files
    pub already_linked_bytes: u64,
    /// Entries that could not be stat'ed or listed
    pub unreadable: usize,
    /// Files that survived size grouping
    pub size_candidates: usize,
    /// Files that survived partial-hash grouping
    pub partial_candidates: usize,
    /// Files whose full hash was taken from the partial hash
    pub full_hash_skipped: usize,
    /// Files dropped because they could not be read for hashing
    pub hash_failures: usize,
    /// Files dropped by the final identity check
    pub rejected_members: usize,
    /// Bytes read for partial hashes
    pub partial_bytes_read: u64,
    /// Bytes read for full hashes
    pub full_bytes_read: u64,
    /// Confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Copies across all groups (members minus origins)
    pub duplicate_files: usize,
    /// Σ size × (members − 1)
    pub wasted_bytes: u64,
    /// Wall time of the scan
    pub scan_duration: Duration,
}

impl ScanStats {
    /// Bytes actually read from disk for hashing.
    #[must_use]
    pub fn bytes_hashed(&self) -> u64 {
        self.partial_bytes_read + self.full_bytes_read
    }

    /// Selected bytes per byte actually hashed; `None` if nothing was read.
    #[must_use]
    pub fn speedup(&self) -> Option<f64> {
        match self.bytes_hashed() {
            0 => None,
            hashed => Some(self.bytes_selected as f64 / hashed as f64),
        }
    }

    /// Percentage of the selected bytes that are wasted by duplicates.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.bytes_selected == 0 {
            0.0
        } else {
            (self.wasted_bytes as f64 / self.bytes_selected as f64) * 100.0
        }
    }

    fn absorb_walk(&mut self, counters: &WalkCounters) {
        self.files_examined = counters.files_examined;
        self.files_selected = counters.files_selected;
        self.bytes_selected = counters.bytes_selected;
        self.below_threshold = counters.below_threshold;
        self.other_device = counters.other_device;
        self.already_linked_files = counters.already_linked_files;
        self.already_linked_bytes = counters.already_linked_bytes;
        self.unreadable = counters.unreadable;
    }

    fn record_group(&mut self, group: &MatchGroup) {
        self.duplicate_groups += 1;
        self.duplicate_files += group.len() - 1;
        self.wasted_bytes += group.wasted_bytes();
    }
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Spill storage failed.
    #[error(transparent)]
    Spill(#[from] SpillError),
}

impl From<Interrupted> for FinderError {
    fn from(_: Interrupted) -> Self {
        Self::Interrupted
    }
}

impl From<ScanError> for FinderError {
    fn from(error: ScanError) -> Self {
        match error {
            ScanError::NotFound(path) => Self::PathNotFound(path),
            ScanError::NotADirectory(path) => Self::NotADirectory(path),
            ScanError::Interrupted(_) => Self::Interrupted,
        }
    }
}

/// A stage-3 member with the metadata observed just before confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Path of the member
    pub path: PathBuf,
    /// Current size
    pub size: u64,
    /// Current identity; `None` where the platform has none
    pub identity: Option<FileIdentity>,
}

impl Member {
    /// Stat `path`; `None` if it vanished or became unreadable.
    #[must_use]
    pub fn stat(path: &Path) -> Option<Self> {
        match std::fs::metadata(path) {
            Ok(metadata) => Some(Self {
                path: path.to_path_buf(),
                size: metadata.len(),
                identity: FileIdentity::from_metadata(&metadata),
            }),
            Err(e) => {
                log::debug!("Cannot stat {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Secondary check between the origin (first member) and every other member
/// of a full-hash group.
///
/// A member is kept when its size still equals `size`, it lives on the
/// origin's device, and (unless `policy` is [`LinkPolicy::Report`]) it is not
/// the origin's own inode under another name. The first member with the
/// expected size becomes the origin. Returns the kept paths, origin first,
/// or an empty vector when fewer than two remain.
#[must_use]
pub fn confirm_members(size: u64, members: Vec<Member>, policy: LinkPolicy) -> Vec<PathBuf> {
    let mut origin: Option<Option<FileIdentity>> = None;
    let mut kept = Vec::with_capacity(members.len());

    for member in members {
        if member.size != size {
            log::debug!(
                "Size of {} changed during scan ({} -> {})",
                member.path.display(),
                size,
                member.size
            );
            continue;
        }

        let Some(origin_identity) = origin else {
            origin = Some(member.identity);
            kept.push(member.path);
            continue;
        };

        if let (Some(o), Some(m)) = (origin_identity, member.identity) {
            if o.device != m.device {
                log::debug!(
                    "Skipping {}: on device {} but origin is on {}",
                    member.path.display(),
                    m.device,
                    o.device
                );
                continue;
            }
            if o.same_object(&m) && policy == LinkPolicy::Skip {
                log::debug!("Skipping {}: same file as origin", member.path.display());
                continue;
            }
        }
        kept.push(member.path);
    }

    if kept.len() < 2 {
        kept.clear();
    }
    kept
}

/// Duplicate finder that orchestrates the multi-stage detection pipeline.
///
/// # Example
///
/// ```no_run
/// use dupelink::duplicates::{DuplicateFinder, FinderConfig};
/// use dupelink::scanner::WalkerConfig;
/// use std::path::PathBuf;
///
/// let config = FinderConfig::default()
///     .with_walker_config(WalkerConfig::default().with_minimal_size(4096));
/// let finder = DuplicateFinder::new(config);
///
/// let stats = finder
///     .for_each_duplicate(&[PathBuf::from("/srv")], |group| {
///         println!("{} has {} copies", group.origin().display(), group.copies().len());
///         Ok(())
///     })
///     .unwrap();
/// println!("{:?}", stats.speedup());
/// ```
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The finder's configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Run the pipeline and collect every confirmed group.
    ///
    /// # Errors
    ///
    /// See [`for_each_duplicate`](Self::for_each_duplicate).
    pub fn find_duplicates(
        &self,
        roots: &[PathBuf],
    ) -> Result<(Vec<MatchGroup>, ScanStats), FinderError> {
        let mut groups = Vec::new();
        let stats = self.for_each_duplicate(roots, |group| {
            groups.push(group);
            Ok(())
        })?;
        Ok((groups, stats))
    }

    /// Run the pipeline, handing each confirmed group to `visit` as soon as
    /// it is known. Groups arrive in ascending size order.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - a root does not exist or is not a directory
    /// - the scan is interrupted, or `visit` returns [`Interrupted`]
    /// - spill storage fails
    pub fn for_each_duplicate<F>(&self, roots: &[PathBuf], mut visit: F) -> Result<ScanStats, FinderError>
    where
        F: FnMut(MatchGroup) -> Result<(), Interrupted>,
    {
        let start_time = Instant::now();
        for root in roots {
            if !root.exists() {
                return Err(FinderError::PathNotFound(root.clone()));
            }
            if !root.is_dir() {
                return Err(FinderError::NotADirectory(root.clone()));
            }
        }

        let mut stats = ScanStats::default();
        let mut hasher = Hasher::new(self.config.hasher, self.config.cancel.clone());

        let size_groups = self.stage_sizes(roots, &mut stats)?;
        self.config.cancel.check()?;

        let partial_groups = self.stage_partial(size_groups, &mut hasher, &mut stats)?;
        self.config.cancel.check()?;

        let full_groups = self.stage_full(partial_groups, &mut hasher, &mut stats)?;
        stats.partial_bytes_read = hasher.partial_bytes_read();
        stats.full_bytes_read = hasher.full_bytes_read();

        let policy = self.config.walker.existing_links;
        for group in full_groups {
            self.config.cancel.check()?;
            let group = group?;
            let size = group.key.size();
            let digest = group.key.digest().unwrap_or(Digest::Unreadable);
            if digest.is_unreadable() {
                log::debug!("Dropping {} unreadable files of {} bytes", group.len(), size);
                stats.hash_failures += group.len();
                continue;
            }

            let offered = group.len();
            let members = group.paths.iter().filter_map(|p| Member::stat(p)).collect();
            let files = confirm_members(size, members, policy);
            stats.rejected_members += offered - files.len();
            if files.is_empty() {
                continue;
            }

            let group = MatchGroup::new(size, digest, files);
            stats.record_group(&group);
            visit(group)?;
        }

        stats.scan_duration = start_time.elapsed();
        log::info!(
            "Scan complete: {} duplicate groups, {} wasted bytes in {:.2?}",
            stats.duplicate_groups,
            stats.wasted_bytes,
            stats.scan_duration
        );
        Ok(stats)
    }

    fn stage_sizes(
        &self,
        roots: &[PathBuf],
        stats: &mut ScanStats,
    ) -> Result<Groups<CandidateKey>, FinderError> {
        log::info!("Stage 1: enumerating {} root(s)", roots.len());
        self.phase_start("walking", 0);

        let mut walker = Walker::new(
            roots.to_vec(),
            self.config.walker.clone(),
            self.config.cancel.clone(),
        );
        let mut spill = SpillWriter::new(&self.config.spill)?;
        let mut count = 0;
        for record in walker.records() {
            let record = record?;
            count += 1;
            self.progress(count, &record.path);
            spill.push(&CandidateKey::Size(record.size), &record.path)?;
        }
        stats.absorb_walk(&walker.counters());

        self.phase_end("walking");
        log::info!(
            "Stage 1: {} files selected ({} bytes) of {} examined",
            stats.files_selected,
            stats.bytes_selected,
            stats.files_examined
        );
        Ok(Groups::new(spill.finish()?))
    }

    fn stage_partial(
        &self,
        size_groups: Groups<CandidateKey>,
        hasher: &mut Hasher,
        stats: &mut ScanStats,
    ) -> Result<Groups<CandidateKey>, FinderError> {
        self.phase_start("partial", 0);

        let mut spill = SpillWriter::new(&self.config.spill)?;
        let mut count = 0;
        for group in size_groups {
            let group = group?;
            let size = group.key.size();
            stats.size_candidates += group.len();
            for path in &group.paths {
                let digest = hasher.partial_hash(path, size)?;
                count += 1;
                self.progress(count, path);
                spill.push(&CandidateKey::Partial { size, digest }, path)?;
            }
        }

        self.phase_end("partial");
        log::info!(
            "Stage 2: {} same-size candidates, {} bytes read",
            stats.size_candidates,
            hasher.partial_bytes_read()
        );
        Ok(Groups::new(spill.finish()?))
    }

    fn stage_full(
        &self,
        partial_groups: Groups<CandidateKey>,
        hasher: &mut Hasher,
        stats: &mut ScanStats,
    ) -> Result<Groups<CandidateKey>, FinderError> {
        self.phase_start("full", 0);

        let mut spill = SpillWriter::new(&self.config.spill)?;
        let mut count = 0;
        for group in partial_groups {
            let group = group?;
            let size = group.key.size();
            let partial = group.key.digest().unwrap_or(Digest::Unreadable);
            if partial.is_unreadable() {
                log::debug!("Dropping {} unreadable files of {} bytes", group.len(), size);
                stats.hash_failures += group.len();
                continue;
            }

            stats.partial_candidates += group.len();
            let covered = hasher.covers_whole_file(size);
            for path in &group.paths {
                let digest = if covered {
                    stats.full_hash_skipped += 1;
                    partial
                } else {
                    hasher.full_hash(path)?
                };
                count += 1;
                self.progress(count, path);
                spill.push(&CandidateKey::Full { size, digest }, path)?;
            }
        }

        self.phase_end("full");
        log::info!(
            "Stage 3: {} partial-hash candidates ({} covered by partial hash), {} bytes read",
            stats.partial_candidates,
            stats.full_hash_skipped,
            hasher.full_bytes_read()
        );
        Ok(Groups::new(spill.finish()?))
    }

    fn phase_start(&self, phase: &str, total: usize) {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase, total);
        }
    }

    fn phase_end(&self, phase: &str) {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase);
        }
    }

    fn progress(&self, current: usize, path: &Path) {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_progress(current, &path.to_string_lossy());
        }
    }
}
