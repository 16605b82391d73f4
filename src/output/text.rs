//! Human-readable report.
//!
//! ```text
//! Group #0 (3.0 MiB)
//!   1.0 MiB /data/a.iso
//!   1.0 MiB /data/backup/a.iso
//!   1.0 MiB /data/old/a.iso
//! Total: 2 duplicate files, 2.0 MiB.
//! ```
//!
//! The origin is always listed first. Groups are written as they arrive so
//! the report never holds more than one group.

use std::io::{self, Write};
use std::time::Duration;

use bytesize::ByteSize;
use yansi::Paint;

use crate::actions::BatchLinkResult;
use crate::duplicates::{MatchGroup, ScanStats};

/// Format bytes with binary units.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    ByteSize::b(bytes).to_string()
}

/// Streaming text report writer.
pub struct TextReport<W: Write> {
    out: W,
    groups: usize,
    copies: usize,
    wasted: u64,
}

impl<W: Write> TextReport<W> {
    /// Create a report writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            groups: 0,
            copies: 0,
            wasted: 0,
        }
    }

    /// Write one group, origin first.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_group(&mut self, group: &MatchGroup) -> io::Result<()> {
        let total = group.size * group.len() as u64;
        let header = format!("Group #{} ({})", self.groups, format_size(total));
        writeln!(self.out, "{}", header.bold())?;

        let size = format!("{:>10}", format_size(group.size));
        writeln!(self.out, "  {} {}", size, group.origin().display())?;
        for copy in group.copies() {
            writeln!(self.out, "  {} {}", size.dim(), copy.display())?;
        }

        self.groups += 1;
        self.copies += group.copies().len();
        self.wasted += group.wasted_bytes();
        Ok(())
    }

    /// Write the `Total:` line for the groups written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_total(&mut self) -> io::Result<()> {
        writeln!(
            self.out,
            "Total: {} duplicate files, {}.",
            self.copies,
            format_size(self.wasted).bold()
        )
    }

    /// Consume the report and return the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// One-line scan summary with throughput and hashing speedup.
#[must_use]
pub fn scan_summary(stats: &ScanStats) -> String {
    let seconds = stats.scan_duration.as_secs_f64();
    let rate = if stats.scan_duration > Duration::ZERO {
        format_size((stats.bytes_selected as f64 / seconds) as u64)
    } else {
        format_size(stats.bytes_selected)
    };
    let speedup = match stats.speedup() {
        Some(factor) => format!("{factor:.1}x speedup"),
        None => "nothing hashed".to_string(),
    };
    format!(
        "Found {} match(es) in {:.3}s. Scanned {}, {}/s. {}",
        stats.duplicate_groups,
        seconds,
        format_size(stats.bytes_selected),
        rate,
        speedup
    )
}

/// Final line after deduplication.
#[must_use]
pub fn link_summary(result: &BatchLinkResult) -> String {
    let mut line = format!(
        "Deduplicated {} files, {}.",
        result.linked_count(),
        format_size(result.bytes_saved)
    );
    if result.skipped_count() > 0 {
        line.push_str(&format!(" {} skipped.", result.skipped_count()));
    }
    if result.failure_count() > 0 {
        line.push_str(&format!(" {} failed.", result.failure_count()));
    }
    line
}
