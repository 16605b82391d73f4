//! JSON output formatter for duplicate scan results.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "hash": "abc123...",
//!       "size": 1024,
//!       "origin": "/data/a.bin",
//!       "copies": ["/data/b.bin"]
//!     }
//!   ],
//!   "stats": {
//!     "files_examined": 100,
//!     "files_selected": 40,
//!     "bytes_selected": 1048576,
//!     "duplicate_groups": 1,
//!     "duplicate_files": 1,
//!     "wasted_bytes": 1024,
//!     "wasted_percentage": 0.1,
//!     "speedup": 12.5,
//!     "scan_duration_ms": 1234
//!   },
//!   "exit_code": 0,
//!   "exit_code_name": "DL000"
//! }
//! ```
//!
//! Paths are written as discovered under their root. Non-UTF-8 bytes are
//! replaced lossily.

use std::io::Write;

use serde::Serialize;

use crate::actions::BatchLinkResult;
use crate::duplicates::{MatchGroup, ScanStats};
use crate::error::ExitCode;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    /// Content digest as hexadecimal string (64 characters)
    pub hash: String,
    /// Size of each member in bytes
    pub size: u64,
    /// The member every copy would be linked to
    pub origin: String,
    /// The other members
    pub copies: Vec<String>,
}

impl From<&MatchGroup> for JsonGroup {
    fn from(group: &MatchGroup) -> Self {
        Self {
            hash: group.digest_hex(),
            size: group.size,
            origin: group.origin().to_string_lossy().into_owned(),
            copies: group
                .copies()
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Scan statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonStats {
    /// Regular files stat'ed
    pub files_examined: usize,
    /// Files above the size threshold
    pub files_selected: usize,
    /// Total size of the selected files
    pub bytes_selected: u64,
    /// Files already hardlinked to a file seen earlier
    pub already_linked_files: usize,
    /// Size of those files
    pub already_linked_bytes: u64,
    /// Files skipped for being on another device
    pub other_device: usize,
    /// Entries that could not be read
    pub unreadable: usize,
    /// Bytes read for partial hashes
    pub partial_bytes_read: u64,
    /// Bytes read for full hashes
    pub full_bytes_read: u64,
    /// Confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Copies across all groups
    pub duplicate_files: usize,
    /// Bytes reclaimable by linking every copy
    pub wasted_bytes: u64,
    /// Share of the selected bytes taken by copies, in percent
    pub wasted_percentage: f64,
    /// Selected bytes per byte hashed
    pub speedup: Option<f64>,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
}

impl From<&ScanStats> for JsonStats {
    fn from(stats: &ScanStats) -> Self {
        Self {
            files_examined: stats.files_examined,
            files_selected: stats.files_selected,
            bytes_selected: stats.bytes_selected,
            already_linked_files: stats.already_linked_files,
            already_linked_bytes: stats.already_linked_bytes,
            other_device: stats.other_device,
            unreadable: stats.unreadable,
            partial_bytes_read: stats.partial_bytes_read,
            full_bytes_read: stats.full_bytes_read,
            duplicate_groups: stats.duplicate_groups,
            duplicate_files: stats.duplicate_files,
            wasted_bytes: stats.wasted_bytes,
            wasted_percentage: stats.wasted_percentage(),
            speedup: stats.speedup(),
            scan_duration_ms: stats.scan_duration.as_millis() as u64,
        }
    }
}

/// Deduplication results in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonLinkResult {
    /// Copies replaced by a link
    pub linked: Vec<String>,
    /// Copies that already shared the origin's inode
    pub already_linked: usize,
    /// Pairings refused by a precondition
    pub skipped: Vec<JsonLinkIssue>,
    /// Pairings that failed
    pub failures: Vec<JsonLinkIssue>,
    /// Bytes reclaimed
    pub bytes_saved: u64,
}

/// A copy the linker did not replace, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct JsonLinkIssue {
    /// The copy
    pub path: String,
    /// Why it was not linked
    pub reason: String,
}

impl From<&BatchLinkResult> for JsonLinkResult {
    fn from(result: &BatchLinkResult) -> Self {
        let issues = |list: &[(std::path::PathBuf, String)]| {
            list.iter()
                .map(|(path, reason)| JsonLinkIssue {
                    path: path.to_string_lossy().into_owned(),
                    reason: reason.clone(),
                })
                .collect()
        };
        Self {
            linked: result
                .linked
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            already_linked: result.already_linked,
            skipped: issues(&result.skipped),
            failures: issues(&result.failures),
            bytes_saved: result.bytes_saved,
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Confirmed duplicate groups
    pub groups: Vec<JsonGroup>,
    /// Scan statistics
    pub stats: JsonStats,
    /// Linking results, present with `--fix`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduplication: Option<JsonLinkResult>,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name
    pub exit_code_name: String,
}

impl JsonOutput {
    /// Create a new JSON output from groups, statistics and exit code.
    ///
    /// # Example
    ///
    /// ```
    /// use dupelink::duplicates::{MatchGroup, ScanStats};
    /// use dupelink::error::ExitCode;
    /// use dupelink::output::json::JsonOutput;
    /// use dupelink::scanner::Digest;
    /// use std::path::PathBuf;
    ///
    /// let groups = vec![MatchGroup::new(
    ///     1024,
    ///     Digest::Content([0u8; 32]),
    ///     vec![PathBuf::from("/file1.txt"), PathBuf::from("/file2.txt")],
    /// )];
    ///
    /// let output = JsonOutput::new(&groups, &ScanStats::default(), ExitCode::Success);
    /// assert_eq!(output.groups.len(), 1);
    /// assert_eq!(output.groups[0].copies, vec!["/file2.txt"]);
    /// ```
    #[must_use]
    pub fn new(groups: &[MatchGroup], stats: &ScanStats, exit_code: ExitCode) -> Self {
        Self {
            groups: groups.iter().map(JsonGroup::from).collect(),
            stats: JsonStats::from(stats),
            deduplication: None,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }

    /// Attach linking results.
    #[must_use]
    pub fn with_link_result(mut self, result: &BatchLinkResult) -> Self {
        self.deduplication = Some(JsonLinkResult::from(result));
        self
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
