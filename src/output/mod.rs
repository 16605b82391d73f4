//! Output formatters for duplicate scan results.
//!
//! This module provides two output formats:
//! - Text, streamed group by group, for people
//! - JSON for automation and scripting
//!
//! # Example
//!
//! ```no_run
//! use dupelink::duplicates::DuplicateFinder;
//! use dupelink::error::ExitCode;
//! use dupelink::output::json::JsonOutput;
//! use std::path::PathBuf;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, stats) = finder.find_duplicates(&[PathBuf::from(".")]).unwrap();
//!
//! let output = JsonOutput::new(&groups, &stats, ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::{JsonOutput, JsonOutputError};
pub use text::{format_size, link_summary, scan_summary, TextReport};
