//! Grouping keys for the three pipeline stages.
//!
//! Keys are serialised into short ASCII strings whose byte order matches the
//! logical order within a stage: sizes are zero-padded to 20 digits and
//! digests are lowercase hex. The encoding never contains the spill record
//! separators (`0x1F`, `0x00`).

use std::fmt;

use crate::scanner::Digest;

/// A value that can be written into and read back from a spill record.
///
/// Implementations must produce ASCII without control bytes, and equal keys
/// must encode to equal bytes.
pub trait SpillKey: Sized {
    /// Append the encoded key to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Parse a key previously produced by [`encode`](Self::encode).
    fn decode(bytes: &[u8]) -> Option<Self>;
}

/// Grouping key at each stage of the duplicate funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKey {
    /// Stage 1: file size.
    Size(u64),
    /// Stage 2: size plus head/tail digest.
    Partial {
        /// File size in bytes
        size: u64,
        /// Partial digest
        digest: Digest,
    },
    /// Stage 3: size plus full-content digest.
    Full {
        /// File size in bytes
        size: u64,
        /// Content digest
        digest: Digest,
    },
}

impl CandidateKey {
    /// The file size carried by every key.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Self::Size(size) | Self::Partial { size, .. } | Self::Full { size, .. } => *size,
        }
    }

    /// The digest, if this is a hash-stage key.
    #[must_use]
    pub fn digest(&self) -> Option<Digest> {
        match self {
            Self::Size(_) => None,
            Self::Partial { digest, .. } | Self::Full { digest, .. } => Some(*digest),
        }
    }

    /// Whether the key carries the unreadable sentinel.
    #[must_use]
    pub fn is_unreadable(&self) -> bool {
        self.digest().is_some_and(|d| d.is_unreadable())
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size(size) => write!(f, "S{size:020}"),
            Self::Partial { size, digest } => write!(f, "P{size:020}:{}", digest.to_hex()),
            Self::Full { size, digest } => write!(f, "F{size:020}:{}", digest.to_hex()),
        }
    }
}

impl SpillKey for CandidateKey {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.to_string().as_bytes());
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        let mut chars = text.chars();
        let tag = chars.next()?;
        let rest = chars.as_str();

        if tag == 'S' {
            return rest.parse().ok().map(Self::Size);
        }

        let (size, hex) = rest.split_once(':')?;
        let size = size.parse().ok()?;
        let digest = Digest::from_hex(hex)?;
        match tag {
            'P' => Some(Self::Partial { size, digest }),
            'F' => Some(Self::Full { size, digest }),
            _ => None,
        }
    }
}
