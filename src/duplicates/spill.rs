//! External stable sort over `(key, path)` records.
//!
//! # Overview
//!
//! A [`SpillWriter`] buffers records in memory until `run_records` of them
//! have accumulated, stably sorts the buffer by encoded key and writes it as
//! a run file. [`SpillWriter::finish`] flushes the last run and returns a
//! [`SortedSpill`], a k-way merge over all runs that yields records in key
//! order. Equal keys come out in insertion order: runs are merged with ties
//! broken by run index, and each run is itself stably sorted.
//!
//! At most `merge_fan_in` runs are open at once. With more runs than that,
//! consecutive batches are first merged into intermediate runs, pass after
//! pass, until the final merge fits. Batches are contiguous, so the
//! intermediate runs keep insertion order between them.
//!
//! All run files live in one run-scoped [`tempfile::TempDir`], which is
//! removed when the [`SortedSpill`] (or an unfinished writer) is dropped.
//!
//! # Record format
//!
//! ```text
//! <key bytes> 0x1F <path bytes> 0x00
//! ```
//!
//! Keys are ASCII (see [`SpillKey`]) and paths never contain NUL on Unix.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::key::SpillKey;

/// Separator between key and path in a record.
pub const KEY_SEPARATOR: u8 = 0x1F;

/// Record terminator.
pub const RECORD_TERMINATOR: u8 = 0x00;

/// Default number of records sorted in memory per run.
pub const DEFAULT_RUN_RECORDS: usize = 64 * 1024;

/// Default number of run files merged at once.
pub const DEFAULT_MERGE_FAN_IN: usize = 64;

/// Where and how spill runs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpillConfig {
    /// Parent directory for the run-scoped temp dir; system temp dir if `None`.
    pub dir: Option<PathBuf>,
    /// Records held in memory before a run is written.
    pub run_records: usize,
    /// Run files open at once during a merge.
    pub merge_fan_in: usize,
}

impl Default for SpillConfig {
    fn default() -> Self {
        Self {
            dir: None,
            run_records: DEFAULT_RUN_RECORDS,
            merge_fan_in: DEFAULT_MERGE_FAN_IN,
        }
    }
}

impl SpillConfig {
    /// Set the parent directory for spill files.
    #[must_use]
    pub fn with_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dir = dir;
        self
    }

    /// Set the in-memory run size (at least 1).
    #[must_use]
    pub fn with_run_records(mut self, records: usize) -> Self {
        self.run_records = records.max(1);
        self
    }

    /// Set how many runs are merged at once (at least 2).
    #[must_use]
    pub fn with_merge_fan_in(mut self, runs: usize) -> Self {
        self.merge_fan_in = runs.max(2);
        self
    }
}

/// Errors raised by spill storage.
#[derive(thiserror::Error, Debug)]
pub enum SpillError {
    /// The run directory could not be created.
    #[error("Cannot create spill directory in {path}: {source}")]
    CreateDir {
        /// Parent directory
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Reading or writing a run file failed.
    #[error("Spill I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record did not parse.
    #[error("Malformed spill record")]
    Corrupt,
}

/// Accumulates records and writes sorted runs.
pub struct SpillWriter<K> {
    dir: TempDir,
    run_records: usize,
    fan_in: usize,
    buffer: Vec<(Vec<u8>, PathBuf)>,
    runs: Vec<PathBuf>,
    records: u64,
    _key: PhantomData<K>,
}

impl<K: SpillKey> SpillWriter<K> {
    /// Create a writer with a fresh run directory.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::CreateDir`] if the directory cannot be created.
    pub fn new(config: &SpillConfig) -> Result<Self, SpillError> {
        let parent = config.dir.clone().unwrap_or_else(std::env::temp_dir);
        let prefix = format!("dupelink-{}-", std::process::id());
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&parent)
            .map_err(|source| SpillError::CreateDir {
                path: parent.clone(),
                source,
            })?;
        log::trace!("Spill directory: {}", dir.path().display());

        let run_records = config.run_records.max(1);
        Ok(Self {
            dir,
            run_records,
            fan_in: config.merge_fan_in.max(2),
            buffer: Vec::with_capacity(run_records.min(4096)),
            runs: Vec::new(),
            records: 0,
            _key: PhantomData,
        })
    }

    /// Directory holding this writer's runs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Records pushed so far.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.records
    }

    /// Whether no record has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Io`] if a full run cannot be written.
    pub fn push(&mut self, key: &K, path: &Path) -> Result<(), SpillError> {
        let mut encoded = Vec::with_capacity(96);
        key.encode(&mut encoded);
        debug_assert!(!encoded.contains(&KEY_SEPARATOR) && !encoded.contains(&RECORD_TERMINATOR));

        self.buffer.push((encoded, path.to_path_buf()));
        self.records += 1;
        if self.buffer.len() >= self.run_records {
            self.flush_run()?;
        }
        Ok(())
    }

    /// Write the last run and open the merged, sorted stream.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Io`] if a run cannot be written or reopened.
    pub fn finish(mut self) -> Result<SortedSpill<K>, SpillError> {
        if !self.buffer.is_empty() {
            self.flush_run()?;
        }

        let mut pass = 0;
        while self.runs.len() > self.fan_in {
            self.merge_pass(pass)?;
            pass += 1;
        }

        let merge = RunMerge::open(&self.runs)?;
        Ok(SortedSpill {
            merge,
            dir: self.dir,
            _key: PhantomData,
        })
    }

    fn flush_run(&mut self) -> Result<(), SpillError> {
        self.buffer.sort_by(|a, b| a.0.cmp(&b.0));

        let path = self.dir.path().join(format!("run-{:05}", self.runs.len()));
        let mut out = BufWriter::new(File::create(&path)?);
        for (key, value) in self.buffer.drain(..) {
            write_record(&mut out, &key, &value)?;
        }
        out.flush()?;

        log::trace!("Wrote spill run {}", path.display());
        self.runs.push(path);
        Ok(())
    }

    /// Merge each batch of `fan_in` consecutive runs into one run.
    fn merge_pass(&mut self, pass: usize) -> Result<(), SpillError> {
        let inputs = std::mem::take(&mut self.runs);
        log::debug!(
            "Spill merge pass {}: {} runs, fan-in {}",
            pass,
            inputs.len(),
            self.fan_in
        );

        for (index, batch) in inputs.chunks(self.fan_in).enumerate() {
            let path = self
                .dir
                .path()
                .join(format!("merge-{pass:02}-{index:05}"));
            let mut out = BufWriter::new(File::create(&path)?);
            let mut merge = RunMerge::open(batch)?;
            while let Some((key, value)) = merge.pop()? {
                write_record(&mut out, &key, &value)?;
            }
            out.flush()?;
            drop(merge);

            for run in batch {
                fs::remove_file(run)?;
            }
            self.runs.push(path);
        }
        Ok(())
    }
}

/// Heap merge over a set of open runs.
struct RunMerge {
    readers: Vec<BufReader<File>>,
    heap: BinaryHeap<Reverse<(Vec<u8>, usize, PathBuf)>>,
    scratch: Vec<u8>,
}

impl RunMerge {
    fn open(runs: &[PathBuf]) -> Result<Self, SpillError> {
        let mut readers = Vec::with_capacity(runs.len());
        for run in runs {
            readers.push(BufReader::new(File::open(run)?));
        }

        let mut merge = Self {
            readers,
            heap: BinaryHeap::new(),
            scratch: Vec::new(),
        };
        for index in 0..merge.readers.len() {
            merge.advance(index)?;
        }
        Ok(merge)
    }

    fn advance(&mut self, index: usize) -> Result<(), SpillError> {
        if let Some((key, path)) = read_record(&mut self.readers[index], &mut self.scratch)? {
            self.heap.push(Reverse((key, index, path)));
        }
        Ok(())
    }

    /// Smallest record; ties go to the earliest run.
    fn pop(&mut self) -> Result<Option<(Vec<u8>, PathBuf)>, SpillError> {
        let Some(Reverse((key, index, path))) = self.heap.pop() else {
            return Ok(None);
        };
        self.advance(index)?;
        Ok(Some((key, path)))
    }
}

/// Merged view over all sorted runs; yields `(key, path)`.
pub struct SortedSpill<K> {
    merge: RunMerge,
    dir: TempDir,
    _key: PhantomData<K>,
}

impl<K: SpillKey> SortedSpill<K> {
    /// Directory holding the runs; removed on drop.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    fn next_record(&mut self) -> Result<Option<(K, PathBuf)>, SpillError> {
        let Some((key, path)) = self.merge.pop()? else {
            return Ok(None);
        };
        let key = K::decode(&key).ok_or(SpillError::Corrupt)?;
        Ok(Some((key, path)))
    }
}

impl<K: SpillKey> Iterator for SortedSpill<K> {
    type Item = Result<(K, PathBuf), SpillError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn write_record(out: &mut impl Write, key: &[u8], path: &Path) -> io::Result<()> {
    out.write_all(key)?;
    out.write_all(&[KEY_SEPARATOR])?;
    out.write_all(&path_to_bytes(path))?;
    out.write_all(&[RECORD_TERMINATOR])
}

fn read_record(
    reader: &mut impl BufRead,
    scratch: &mut Vec<u8>,
) -> Result<Option<(Vec<u8>, PathBuf)>, SpillError> {
    scratch.clear();
    if reader.read_until(RECORD_TERMINATOR, scratch)? == 0 {
        return Ok(None);
    }
    if scratch.pop() != Some(RECORD_TERMINATOR) {
        return Err(SpillError::Corrupt);
    }
    let split = scratch
        .iter()
        .position(|&b| b == KEY_SEPARATOR)
        .ok_or(SpillError::Corrupt)?;
    let key = scratch[..split].to_vec();
    let path = bytes_to_path(&scratch[split + 1..]);
    Ok(Some((key, path)))
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

// Non-Unix paths are stored lossily as UTF-8.
#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
