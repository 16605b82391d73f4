//! Layered application settings.
//!
//! Settings are merged with `figment`, later layers winning:
//!
//! 1. built-in defaults ([`Settings::default`])
//! 2. a TOML file: `--config PATH`, or `dupelink/config.toml` in the
//!    platform config directory when it exists
//! 3. `DUPELINK_*` environment variables (e.g. `DUPELINK_MINIMAL_SIZE=10m`)
//! 4. flags given on the command line
//!
//! ```toml
//! minimal_size = "100k"
//! blacklist = [".git", ".snapshots"]
//! existing_links = "report"
//! tail_window = false
//! ```

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::{parse_size, Cli, OutputFormat};
use crate::duplicates::{FinderConfig, SpillConfig, DEFAULT_RUN_RECORDS};
use crate::scanner::{HasherConfig, LinkPolicy, WalkerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PARTIAL_WINDOW};

/// Minimal size used when only reporting.
pub const DEFAULT_REPORT_MINIMAL_SIZE: u64 = 1024 * 1024;

/// Minimal size used when deduplicating.
pub const DEFAULT_FIX_MINIMAL_SIZE: u64 = 4 * 1024;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DUPELINK_";

/// Errors raised while loading settings.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or has the wrong type.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] figment::Error),

    /// `minimal_size` did not parse.
    #[error("Invalid minimal_size '{value}': {reason}")]
    InvalidSize {
        /// The offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// A size given either as a plain byte count or with a suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    /// Byte count
    Bytes(u64),
    /// Text such as `"100k"`
    Text(String),
}

impl SizeValue {
    /// Resolve to a byte count.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSize`] if the text does not parse.
    pub fn bytes(&self) -> Result<u64, ConfigError> {
        match self {
            Self::Bytes(n) => Ok(*n),
            Self::Text(s) => parse_size(s).map_err(|reason| ConfigError::InvalidSize {
                value: s.clone(),
                reason,
            }),
        }
    }
}

/// Effective settings after all layers are merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Exclusive size threshold; `None` picks the mode default.
    pub minimal_size: Option<SizeValue>,
    /// Directory names never descended into.
    pub blacklist: Vec<String>,
    /// Follow symbolic links.
    pub follow_links: bool,
    /// Treatment of already-hardlinked files.
    pub existing_links: LinkPolicy,
    /// Partial hash window in bytes.
    pub partial_window: u64,
    /// Include the file tail in the partial hash.
    pub tail_window: bool,
    /// Full hash read size in bytes.
    pub chunk_size: u64,
    /// Parent directory for spill files.
    pub spill_dir: Option<PathBuf>,
    /// Records sorted in memory per spill run.
    pub spill_run_records: usize,
    /// Report format.
    pub output: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            minimal_size: None,
            blacklist: Vec::new(),
            follow_links: false,
            existing_links: LinkPolicy::Skip,
            partial_window: DEFAULT_PARTIAL_WINDOW,
            tail_window: true,
            chunk_size: DEFAULT_CHUNK_SIZE as u64,
            spill_dir: None,
            spill_run_records: DEFAULT_RUN_RECORDS,
            output: OutputFormat::Text,
        }
    }
}

/// The subset of settings a command line can override.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    minimal_size: Option<SizeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blacklist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    follow_links: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    existing_links: Option<LinkPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    partial_window: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tail_window: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunk_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spill_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<OutputFormat>,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        Self {
            minimal_size: cli.minimal_size.map(SizeValue::Bytes),
            blacklist: (!cli.blacklist.is_empty()).then(|| cli.blacklist.clone()),
            follow_links: cli.follow_links.then_some(true),
            existing_links: cli.existing_links,
            partial_window: cli.partial_window,
            tail_window: cli.no_tail.then_some(false),
            chunk_size: cli.chunk_size,
            spill_dir: cli.spill_dir.clone(),
            output: cli.output,
        }
    }
}

impl Settings {
    /// Load all layers for this command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit config file is missing or any
    /// layer is malformed. A missing default config file is not an error.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.clone())),
            Some(path) => Some(path.clone()),
            None => default_config_path().filter(|p| p.exists()),
        };
        if let Some(ref path) = file {
            log::debug!("Loading config from {}", path.display());
        }
        Self::from_layers(cli, file.as_deref(), true)
    }

    /// Merge defaults, an optional file, optionally the environment, and
    /// the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a layer is malformed.
    pub fn from_layers(cli: &Cli, file: Option<&Path>, env: bool) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        if env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX));
        }
        figment = figment.merge(Serialized::defaults(CliOverrides::from(cli)));
        Ok(figment.extract()?)
    }

    /// The exclusive size threshold for the chosen mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSize`] if a configured size does not parse.
    pub fn minimal_size(&self, fix: bool) -> Result<u64, ConfigError> {
        match &self.minimal_size {
            Some(value) => value.bytes(),
            None if fix => Ok(DEFAULT_FIX_MINIMAL_SIZE),
            None => Ok(DEFAULT_REPORT_MINIMAL_SIZE),
        }
    }

    /// Build the finder configuration (without cancel token or progress).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSize`] if the minimal size does not parse.
    pub fn finder_config(&self, fix: bool) -> Result<FinderConfig, ConfigError> {
        let walker = WalkerConfig::default()
            .with_minimal_size(self.minimal_size(fix)?)
            .with_follow_links(self.follow_links)
            .with_blacklist(self.blacklist.iter().cloned())
            .with_existing_links(self.existing_links);
        let hasher = HasherConfig {
            partial_window: self.partial_window,
            tail_window: self.tail_window,
            chunk_size: usize::try_from(self.chunk_size).unwrap_or(DEFAULT_CHUNK_SIZE),
        };
        let spill = SpillConfig::default()
            .with_dir(self.spill_dir.clone())
            .with_run_records(self.spill_run_records);

        Ok(FinderConfig::default()
            .with_walker_config(walker)
            .with_hasher_config(hasher)
            .with_spill_config(spill))
    }
}

/// `dupelink/config.toml` in the platform config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "dupelink").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["dupelink"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_layers(&cli(&[]), None, false).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.minimal_size(false).unwrap(), 1024 * 1024);
        assert_eq!(settings.minimal_size(true).unwrap(), 4096);
    }

    #[test]
    fn test_file_layer() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
minimal_size = "100k"
blacklist = [".git", ".snapshots"]
existing_links = "report"
tail_window = false
output = "json"
"#,
        );

        let settings = Settings::from_layers(&cli(&[]), Some(&path), false).unwrap();
        assert_eq!(settings.minimal_size(false).unwrap(), 102_400);
        assert_eq!(settings.minimal_size(true).unwrap(), 102_400);
        assert_eq!(settings.blacklist, vec![".git", ".snapshots"]);
        assert_eq!(settings.existing_links, LinkPolicy::Report);
        assert!(!settings.tail_window);
        assert_eq!(settings.output, OutputFormat::Json);
        assert_eq!(settings.partial_window, DEFAULT_PARTIAL_WINDOW);
    }

    #[test]
    fn test_numeric_minimal_size_in_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "minimal_size = 10\n");
        let settings = Settings::from_layers(&cli(&[]), Some(&path), false).unwrap();
        assert_eq!(settings.minimal_size(false).unwrap(), 10);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "minimal_size = \"100k\"\nblacklist = [\".git\"]\n");

        let settings = Settings::from_layers(
            &cli(&["--minimal-size", "1k", "-x", "tmp", "--no-tail", "-L"]),
            Some(&path),
            false,
        )
        .unwrap();
        assert_eq!(settings.minimal_size(false).unwrap(), 1024);
        assert_eq!(settings.blacklist, vec!["tmp"]);
        assert!(!settings.tail_window);
        assert!(settings.follow_links);
    }

    #[test]
    fn test_absent_flags_keep_file_values() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "follow_links = true\nchunk_size = 4096\n");
        let settings = Settings::from_layers(&cli(&[]), Some(&path), false).unwrap();
        assert!(settings.follow_links);
        assert_eq!(settings.chunk_size, 4096);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "existing_links = \"sometimes\"\n");
        let err = Settings::from_layers(&cli(&[]), Some(&path), false).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Settings::load(&cli(&["--config", missing.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_size_text() {
        let settings = Settings {
            minimal_size: Some(SizeValue::Text("huge".into())),
            ..Settings::default()
        };
        assert!(matches!(
            settings.minimal_size(false),
            Err(ConfigError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_finder_config_mapping() {
        let settings = Settings {
            minimal_size: Some(SizeValue::Bytes(7)),
            blacklist: vec![".git".into()],
            partial_window: 512,
            tail_window: false,
            chunk_size: 8192,
            spill_run_records: 10,
            ..Settings::default()
        };
        let config = settings.finder_config(true).unwrap();
        assert_eq!(config.walker.minimal_size, 7);
        assert!(config.walker.blacklist.contains(std::ffi::OsStr::new(".git")));
        assert_eq!(config.hasher.partial_window, 512);
        assert!(!config.hasher.tail_window);
        assert_eq!(config.hasher.chunk_size, 8192);
        assert_eq!(config.spill.run_records, 10);
    }

    #[test]
    fn test_default_config_path_name() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
