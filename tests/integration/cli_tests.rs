use clap::Parser;
use dupelink::cli::Cli;
use dupelink::error::ExitCode;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// An empty config file so a user's own settings never leak in.
fn empty_config() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "").unwrap();
    dir
}

fn cli(config: &Path, args: &[&str]) -> Cli {
    let config = config.join("config.toml");
    let mut argv = vec!["dupelink", "--quiet", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    Cli::parse_from(argv)
}

#[test]
fn test_no_folders_prints_usage_and_succeeds() {
    let code = dupelink::run_app(Cli::parse_from(["dupelink"])).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_report_run_leaves_files_alone() {
    let config = empty_config();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bin"), [1u8; 8192]).unwrap();
    fs::write(dir.path().join("b.bin"), [1u8; 8192]).unwrap();

    let root = dir.path().to_str().unwrap();
    let code = dupelink::run_app(cli(config.path(), &["-o", "json", "-s", "1k", root])).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(dir.path().join("a.bin").exists());
    assert!(dir.path().join("b.bin").exists());
}

#[cfg(unix)]
#[test]
fn test_fix_links_copies() {
    use std::os::unix::fs::MetadataExt;

    let config = empty_config();
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    fs::write(&a, [2u8; 8192]).unwrap();
    fs::write(&b, [2u8; 8192]).unwrap();

    let root = dir.path().to_str().unwrap();
    let code = dupelink::run_app(cli(config.path(), &["--fix", root])).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(
        fs::metadata(&a).unwrap().ino(),
        fs::metadata(&b).unwrap().ino()
    );
}

#[cfg(unix)]
#[test]
fn test_fix_respects_default_threshold() {
    use std::os::unix::fs::MetadataExt;

    let config = empty_config();
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    fs::write(&a, [3u8; 4096]).unwrap();
    fs::write(&b, [3u8; 4096]).unwrap();

    let root = dir.path().to_str().unwrap();
    dupelink::run_app(cli(config.path(), &["--fix", root])).unwrap();

    assert_ne!(
        fs::metadata(&a).unwrap().ino(),
        fs::metadata(&b).unwrap().ino()
    );
}

#[test]
fn test_missing_folder_is_general_error() {
    let config = empty_config();
    let err = dupelink::run_app(cli(config.path(), &["/definitely/not/here"])).unwrap_err();

    assert_eq!(ExitCode::from_error(&err), ExitCode::GeneralError);
    assert!(format!("{err:#}").contains("/definitely/not/here"));
}

#[test]
fn test_missing_config_file_is_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let cli = Cli::parse_from([
        "dupelink",
        "--config",
        missing.to_str().unwrap(),
        dir.path().to_str().unwrap(),
    ]);

    assert!(dupelink::run_app(cli).is_err());
}
