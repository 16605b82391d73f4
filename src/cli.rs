//! Command-line interface definitions for dupelink.
//!
//! All options are flat flags on a single command; positional arguments are
//! the root folders. Flags that can also come from the config file are
//! `Option`s so that an omitted flag does not override the file.
//!
//! # Example
//!
//! ```bash
//! # Report duplicates larger than 1 MiB
//! dupelink ~/Videos ~/Backups
//!
//! # Replace duplicates larger than 100 KiB with hardlinks
//! dupelink --fix --minimal-size 100k ~/Photos
//!
//! # JSON report, skipping VCS metadata
//! dupelink --output json -x .git -x .hg ~/src
//! ```

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scanner::LinkPolicy;

/// Find duplicate files and optionally replace them with hardlinks.
///
/// Files are compared by size, then by a hash of their first and last
/// kilobyte, then by a hash of their whole content. Only files on the same
/// filesystem as the first file found are considered.
#[derive(Debug, Parser)]
#[command(name = "dupelink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root folders to scan
    #[arg(value_name = "FOLDER")]
    pub folders: Vec<PathBuf>,

    /// Only consider files strictly larger than SIZE (e.g. 4096, 100k, 1M, 2g)
    ///
    /// Suffixes are base 1024 and case-insensitive.
    /// Default: 1M when reporting, 4k with --fix.
    #[arg(short = 's', long, value_name = "SIZE", value_parser = parse_size)]
    pub minimal_size: Option<u64>,

    /// Replace duplicates with hardlinks to the first copy found
    #[arg(short, long, visible_alias = "deduplicate")]
    pub fix: bool,

    /// Follow symbolic links during the scan
    #[arg(short = 'L', long)]
    pub follow_links: bool,

    /// Directory name never descended into (can be given multiple times)
    #[arg(short = 'x', long = "blacklist", value_name = "NAME")]
    pub blacklist: Vec<String>,

    /// How files that are already hardlinked to each other are treated
    #[arg(long, value_enum, value_name = "POLICY")]
    pub existing_links: Option<LinkPolicy>,

    /// Bytes hashed at the start (and end) of each file before a full read
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub partial_window: Option<u64>,

    /// Do not include the end of the file in the partial hash
    #[arg(long)]
    pub no_tail: bool,

    /// Read size for full-content hashing
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Directory for temporary sort files (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    pub spill_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Configuration file (default: platform config dir, dupelink/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress and everything but errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// JSON document for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a size with an optional binary suffix into bytes.
///
/// Suffixes `k`, `m`, `g` and `t` (optionally followed by `b` or `ib`) are
/// powers of 1024; a bare number or `b` is bytes. Case-insensitive.
///
/// # Examples
///
/// ```
/// use dupelink::cli::parse_size;
///
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert_eq!(parse_size("4k").unwrap(), 4096);
/// assert_eq!(parse_size("1M").unwrap(), 1_048_576);
/// assert_eq!(parse_size("1.5KiB").unwrap(), 1536);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_ascii_lowercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let exponent = match suffix.as_str() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 1,
        "m" | "mb" | "mib" => 2,
        "g" | "gb" | "gib" => 3,
        "t" | "tb" | "tib" => 4,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * 1024f64.powi(exponent)) as u64)
}
