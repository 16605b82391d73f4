//! BLAKE3 file hasher with bounded reads.
//!
//! # Overview
//!
//! - [`Hasher::partial_hash`] digests at most the first `partial_window`
//!   bytes, plus the last `partial_window` bytes when the tail window is
//!   enabled and the file is larger than the window.
//! - [`Hasher::full_hash`] streams the whole file in `chunk_size` chunks, so
//!   memory use does not depend on file size.
//!
//! Both fail soft: a file that cannot be opened or read yields
//! [`Digest::Unreadable`], which never equals a real digest. The only error
//! either method returns is [`Interrupted`].
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{Hasher, HasherConfig};
//! use dupelink::signal::CancelToken;
//! use std::path::Path;
//!
//! let mut hasher = Hasher::new(HasherConfig::default(), CancelToken::new());
//! let path = Path::new("video.mkv");
//! let size = std::fs::metadata(path).unwrap().len();
//!
//! let partial = hasher.partial_hash(path, size).unwrap();
//! if !hasher.covers_whole_file(size) {
//!     let full = hasher.full_hash(path).unwrap();
//!     println!("{partial} / {full}");
//! }
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::signal::{CancelToken, Interrupted};

/// Default number of bytes covered by the partial hash (head, and tail).
pub const DEFAULT_PARTIAL_WINDOW: u64 = 1024;

/// Default read size for full hashing.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Content digest, or the sentinel for files that could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Digest {
    /// The file could not be opened or read.
    Unreadable,
    /// BLAKE3 digest of the bytes read.
    Content([u8; 32]),
}

impl Digest {
    /// Hex form used in spill keys; the sentinel encodes as `-`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        match self {
            Self::Unreadable => "-".to_string(),
            Self::Content(bytes) => blake3::Hash::from(*bytes).to_hex().to_string(),
        }
    }

    /// Parse the output of [`to_hex`](Self::to_hex).
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        if s == "-" {
            return Some(Self::Unreadable);
        }
        blake3::Hash::from_hex(s)
            .ok()
            .map(|h| Self::Content(*h.as_bytes()))
    }

    /// Whether this is the unreadable sentinel.
    #[must_use]
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unreadable)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable => f.write_str("<unreadable>"),
            Self::Content(_) => f.write_str(&self.to_hex()),
        }
    }
}

/// Hasher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherConfig {
    /// Bytes read from the head (and tail) for the partial hash.
    pub partial_window: u64,
    /// Also digest the last `partial_window` bytes in the partial hash.
    pub tail_window: bool,
    /// Read size for full hashing.
    pub chunk_size: usize,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            partial_window: DEFAULT_PARTIAL_WINDOW,
            tail_window: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Streaming hasher that counts the bytes it actually reads.
#[derive(Debug)]
pub struct Hasher {
    config: HasherConfig,
    cancel: CancelToken,
    buffer: Vec<u8>,
    partial_bytes: u64,
    full_bytes: u64,
}

impl Hasher {
    /// Create a hasher. Zero-sized windows or chunks are raised to 1.
    #[must_use]
    pub fn new(config: HasherConfig, cancel: CancelToken) -> Self {
        let config = HasherConfig {
            partial_window: config.partial_window.max(1),
            chunk_size: config.chunk_size.max(1),
            ..config
        };
        Self {
            config,
            cancel,
            buffer: vec![0; config.chunk_size],
            partial_bytes: 0,
            full_bytes: 0,
        }
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> HasherConfig {
        self.config
    }

    /// Whether the partial hash of a file this size already covers every byte.
    #[must_use]
    pub fn covers_whole_file(&self, size: u64) -> bool {
        let window = self.config.partial_window;
        if self.config.tail_window {
            size <= window.saturating_mul(2)
        } else {
            size <= window
        }
    }

    /// Bytes read by partial hashing so far.
    #[must_use]
    pub fn partial_bytes_read(&self) -> u64 {
        self.partial_bytes
    }

    /// Bytes read by full hashing so far.
    #[must_use]
    pub fn full_bytes_read(&self) -> u64 {
        self.full_bytes
    }

    /// Digest the head (and tail) window of a file of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] if cancellation was requested.
    pub fn partial_hash(&mut self, path: &Path, size: u64) -> Result<Digest, Interrupted> {
        self.cancel.check()?;
        match self.read_partial(path, size) {
            Ok(digest) => Ok(digest),
            Err(e) => {
                log::debug!("Cannot read {}: {}", path.display(), e);
                Ok(Digest::Unreadable)
            }
        }
    }

    /// Digest the entire content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] if cancellation was requested, checked before
    /// every chunk.
    pub fn full_hash(&mut self, path: &Path) -> Result<Digest, Interrupted> {
        self.cancel.check()?;
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                log::debug!("Cannot open {}: {}", path.display(), e);
                return Ok(Digest::Unreadable);
            }
        };

        let mut hasher = blake3::Hasher::new();
        loop {
            self.cancel.check()?;
            let n = match file.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("Cannot read {}: {}", path.display(), e);
                    return Ok(Digest::Unreadable);
                }
            };
            self.full_bytes += n as u64;
            hasher.update(&self.buffer[..n]);
        }

        log::trace!("Full hash computed: {}", path.display());
        Ok(Digest::Content(*hasher.finalize().as_bytes()))
    }

    fn read_partial(&mut self, path: &Path, size: u64) -> io::Result<Digest> {
        let window = self.config.partial_window;
        let mut file = File::open(path)?;
        let mut hasher = blake3::Hasher::new();

        let head = read_window(&mut file, window, &mut self.buffer, &mut hasher)?;
        self.partial_bytes += head;

        if self.config.tail_window && size > window {
            file.seek(SeekFrom::End(-(window as i64)))?;
            let tail = read_window(&mut file, window, &mut self.buffer, &mut hasher)?;
            self.partial_bytes += tail;
        }

        Ok(Digest::Content(*hasher.finalize().as_bytes()))
    }
}

/// Feed at most `limit` bytes from `reader` into `hasher`, returning the count.
fn read_window(
    reader: &mut impl Read,
    limit: u64,
    buffer: &mut [u8],
    hasher: &mut blake3::Hasher,
) -> io::Result<u64> {
    let mut remaining = limit;
    let mut total = 0;
    while remaining > 0 {
        let want = buffer.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = match reader.read(&mut buffer[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
        remaining -= n as u64;
        total += n as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn hasher_with(window: u64, tail: bool) -> Hasher {
        Hasher::new(
            HasherConfig {
                partial_window: window,
                tail_window: tail,
                chunk_size: 16,
            },
            CancelToken::new(),
        )
    }

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_digest_hex_roundtrip() {
        let digest = Digest::Content(*blake3::hash(b"abc").as_bytes());
        let hex = digest.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(Digest::from_hex(&hex), Some(digest));
        assert_eq!(Digest::from_hex("-"), Some(Digest::Unreadable));
        assert_eq!(Digest::from_hex("zz"), None);
    }

    #[test]
    fn test_unreadable_differs_from_any_content() {
        let digest = Digest::Content([0; 32]);
        assert_ne!(Digest::Unreadable, digest);
        assert!(Digest::Unreadable < digest);
        assert!(Digest::Unreadable.is_unreadable());
    }

    #[test]
    fn test_full_hash_matches_blake3() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let path = write(&dir, "data.bin", &content);

        let mut hasher = hasher_with(64, true);
        let digest = hasher.full_hash(&path).unwrap();

        assert_eq!(digest, Digest::Content(*blake3::hash(&content).as_bytes()));
        assert_eq!(hasher.full_bytes_read(), 1000);
    }

    #[test]
    fn test_partial_hash_reads_head_only() {
        let dir = TempDir::new().unwrap();
        let mut a = vec![b'x'; 200];
        let mut b = a.clone();
        a[150] = b'a';
        b[150] = b'b';
        let pa = write(&dir, "a.bin", &a);
        let pb = write(&dir, "b.bin", &b);

        let mut hasher = hasher_with(64, false);
        let da = hasher.partial_hash(&pa, 200).unwrap();
        let db = hasher.partial_hash(&pb, 200).unwrap();

        assert_eq!(da, db);
        assert_eq!(hasher.partial_bytes_read(), 128);
    }

    #[test]
    fn test_partial_hash_tail_detects_trailing_difference() {
        let dir = TempDir::new().unwrap();
        let mut a = vec![b'x'; 200];
        let mut b = a.clone();
        a[199] = b'a';
        b[199] = b'b';
        let pa = write(&dir, "a.bin", &a);
        let pb = write(&dir, "b.bin", &b);

        let mut hasher = hasher_with(64, true);
        let da = hasher.partial_hash(&pa, 200).unwrap();
        let db = hasher.partial_hash(&pb, 200).unwrap();

        assert_ne!(da, db);
        assert_eq!(hasher.partial_bytes_read(), 256);
    }

    #[test]
    fn test_small_file_partial_reads_everything_once() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "small.bin", b"0123456789");

        let mut hasher = hasher_with(64, true);
        hasher.partial_hash(&path, 10).unwrap();

        // No tail read when the head already covers the file
        assert_eq!(hasher.partial_bytes_read(), 10);
    }

    #[test]
    fn test_covers_whole_file() {
        let head_only = hasher_with(1024, false);
        assert!(head_only.covers_whole_file(1024));
        assert!(!head_only.covers_whole_file(1025));

        let with_tail = hasher_with(1024, true);
        assert!(with_tail.covers_whole_file(1024));
        assert!(with_tail.covers_whole_file(2048));
        assert!(!with_tail.covers_whole_file(2049));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.bin");

        let mut hasher = hasher_with(64, true);
        assert_eq!(hasher.partial_hash(&missing, 10).unwrap(), Digest::Unreadable);
        assert_eq!(hasher.full_hash(&missing).unwrap(), Digest::Unreadable);
        assert_eq!(hasher.partial_bytes_read(), 0);
    }

    #[test]
    fn test_cancelled_hash_returns_interrupted() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "data.bin", &[7u8; 100]);

        let cancel = CancelToken::new();
        let mut hasher = Hasher::new(HasherConfig::default(), cancel.clone());
        cancel.cancel();

        assert_eq!(hasher.partial_hash(&path, 100), Err(Interrupted));
        assert_eq!(hasher.full_hash(&path), Err(Interrupted));
        assert_eq!(hasher.full_bytes_read(), 0);
    }

    #[test]
    fn test_zero_config_is_clamped() {
        let hasher = Hasher::new(
            HasherConfig {
                partial_window: 0,
                tail_window: false,
                chunk_size: 0,
            },
            CancelToken::new(),
        );
        assert_eq!(hasher.config().partial_window, 1);
        assert_eq!(hasher.config().chunk_size, 1);
    }
}
