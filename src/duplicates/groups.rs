//! Contiguous-run grouping over a sorted spill, and confirmed duplicate groups.
//!
//! # Overview
//!
//! [`Groups`] performs one sequential pass over a [`SortedSpill`],
//! accumulating consecutive records with the same key and flushing the group
//! when the key changes (and once more at end of input). Only groups with at
//! least two members are yielded; singletons cannot be duplicates of
//! anything. Peak memory is one group.
//!
//! [`group_by`] wraps the whole cycle (spill, sort, scan) for an in-memory
//! record stream.
//!
//! # Example
//!
//! ```
//! use dupelink::duplicates::{group_by, CandidateKey, SpillConfig};
//! use std::path::PathBuf;
//!
//! let records = vec![
//!     (CandidateKey::Size(10), PathBuf::from("/a")),
//!     (CandidateKey::Size(20), PathBuf::from("/b")),
//!     (CandidateKey::Size(10), PathBuf::from("/c")),
//! ];
//!
//! let groups: Vec<_> = group_by(&SpillConfig::default(), records)
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].paths, vec![PathBuf::from("/a"), PathBuf::from("/c")]);
//! ```

use std::path::PathBuf;

use serde::Serialize;

use super::key::SpillKey;
use super::spill::{SortedSpill, SpillConfig, SpillError, SpillWriter};
use crate::scanner::Digest;

/// Paths sharing one key at one stage, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<K> {
    /// Shared key
    pub key: K,
    /// Members; always at least two
    pub paths: Vec<PathBuf>,
}

impl<K> Group<K> {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Always `false` for yielded groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Iterator of multi-member groups over a sorted spill.
///
/// The spill's temporary directory is removed when this iterator is dropped.
pub struct Groups<K> {
    records: SortedSpill<K>,
    pending: Option<(K, Vec<PathBuf>)>,
    done: bool,
}

impl<K: SpillKey + PartialEq> Groups<K> {
    /// Group a sorted spill.
    #[must_use]
    pub fn new(records: SortedSpill<K>) -> Self {
        Self {
            records,
            pending: None,
            done: false,
        }
    }

    fn flush(&mut self) -> Option<Group<K>> {
        match self.pending.take() {
            Some((key, paths)) if paths.len() >= 2 => Some(Group { key, paths }),
            _ => None,
        }
    }
}

impl<K: SpillKey + PartialEq> Iterator for Groups<K> {
    type Item = Result<Group<K>, SpillError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.records.next() {
                Some(Ok((key, path))) => {
                    if let Some((current, paths)) = &mut self.pending {
                        if *current == key {
                            paths.push(path);
                            continue;
                        }
                    }
                    let finished = self.flush();
                    self.pending = Some((key, vec![path]));
                    if let Some(group) = finished {
                        return Some(Ok(group));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    self.pending = None;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return self.flush().map(Ok);
                }
            }
        }
        None
    }
}

/// Spill, sort and group a stream of `(key, path)` records.
///
/// # Errors
///
/// Returns [`SpillError`] if the spill cannot be written. Read errors during
/// grouping surface as `Err` items of the returned iterator.
pub fn group_by<K, I>(config: &SpillConfig, records: I) -> Result<Groups<K>, SpillError>
where
    K: SpillKey + PartialEq,
    I: IntoIterator<Item = (K, PathBuf)>,
{
    let mut writer = SpillWriter::new(config)?;
    for (key, path) in records {
        writer.push(&key, &path)?;
    }
    Ok(Groups::new(writer.finish()?))
}

/// A confirmed set of byte-identical files.
///
/// The first member is the origin; the rest are copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchGroup {
    /// Size shared by all members
    pub size: u64,
    /// Full-content digest shared by all members
    #[serde(serialize_with = "serialize_digest")]
    pub digest: Digest,
    /// Members, origin first
    pub files: Vec<PathBuf>,
}

impl MatchGroup {
    /// Create a match group; `files[0]` is the origin.
    #[must_use]
    pub fn new(size: u64, digest: Digest, files: Vec<PathBuf>) -> Self {
        debug_assert!(files.len() >= 2, "match group needs two members");
        Self {
            size,
            digest,
            files,
        }
    }

    /// The designated original.
    #[must_use]
    pub fn origin(&self) -> &PathBuf {
        &self.files[0]
    }

    /// Every member except the origin.
    #[must_use]
    pub fn copies(&self) -> &[PathBuf] {
        &self.files[1..]
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Bytes reclaimable by linking every copy: `size × (members − 1)`.
    #[must_use]
    pub fn wasted_bytes(&self) -> u64 {
        self.size * (self.files.len().saturating_sub(1) as u64)
    }

    /// Hex form of the digest.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        self.digest.to_hex()
    }
}

fn serialize_digest<S: serde::Serializer>(digest: &Digest, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&digest.to_hex())
}
