use dupelink::actions::{BatchLinkResult, LinkError, LinkOutcome, Linker};
use dupelink::duplicates::{DuplicateFinder, FinderConfig};
use dupelink::scanner::WalkerConfig;
use dupelink::signal::CancelToken;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[cfg(unix)]
fn inode(path: &Path) -> u64 {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).unwrap().ino()
}

fn scan(root: &Path) -> Vec<dupelink::duplicates::MatchGroup> {
    let config = FinderConfig::default()
        .with_walker_config(WalkerConfig::default().with_minimal_size(0));
    DuplicateFinder::new(config)
        .find_duplicates(&[root.to_path_buf()])
        .unwrap()
        .0
}

#[cfg(unix)]
#[test]
fn test_scan_then_link_shares_inode() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.bin", &[1u8; 8192]);
    let b = write(dir.path(), "b.bin", &[1u8; 8192]);
    let c = write(dir.path(), "c.bin", &[1u8; 8192]);

    let groups = scan(dir.path());
    assert_eq!(groups.len(), 1);

    let result = Linker::new(CancelToken::new()).link_groups(&groups).unwrap();

    assert_eq!(result.linked_count(), 2);
    assert_eq!(result.bytes_saved, 2 * 8192);
    assert!(result.all_succeeded());
    assert_eq!(inode(&a), inode(&b));
    assert_eq!(inode(&a), inode(&c));
    assert_eq!(fs::read(&c).unwrap(), vec![1u8; 8192]);
    assert!(!dir.path().join("b.bin~").exists());
    assert!(!dir.path().join("c.bin~").exists());
}

#[cfg(unix)]
#[test]
fn test_second_run_finds_nothing() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.bin", &[2u8; 4096]);
    write(dir.path(), "b.bin", &[2u8; 4096]);

    let groups = scan(dir.path());
    Linker::new(CancelToken::new()).link_groups(&groups).unwrap();

    assert!(scan(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_mode_mismatch_is_skipped_untouched() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.bin", &[3u8; 2048]);
    let b = write(dir.path(), "b.bin", &[3u8; 2048]);
    fs::set_permissions(&a, fs::Permissions::from_mode(0o644)).unwrap();
    fs::set_permissions(&b, fs::Permissions::from_mode(0o600)).unwrap();

    let groups = scan(dir.path());
    assert_eq!(groups.len(), 1);

    let result = Linker::new(CancelToken::new()).link_groups(&groups).unwrap();

    assert_eq!(result.linked_count(), 0);
    assert_eq!(result.skipped.len(), 1);
    assert_ne!(inode(&a), inode(&b));
    assert_eq!(fs::read(&b).unwrap(), vec![3u8; 2048]);
}

#[test]
fn test_existing_temp_blocks_link() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.bin", &[4u8; 100]);
    let b = write(dir.path(), "b.bin", &[4u8; 100]);
    write(dir.path(), "b.bin~", b"in the way");

    let linker = Linker::new(CancelToken::new());
    let err = linker.link_pair(&a, &b, 100).unwrap_err();

    assert!(matches!(err, LinkError::TempExists(_)));
    assert!(err.is_precondition());
    assert_eq!(fs::read(dir.path().join("b.bin~")).unwrap(), b"in the way");
}

#[test]
fn test_size_change_since_scan_is_refused() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.bin", &[5u8; 100]);
    let b = write(dir.path(), "b.bin", &[5u8; 100]);

    let groups = scan(dir.path());
    fs::write(&b, [5u8; 150]).unwrap();

    let mut result = BatchLinkResult::default();
    Linker::new(CancelToken::new())
        .link_group(&groups[0], &mut result)
        .unwrap();

    assert_eq!(result.linked_count(), 0);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(fs::read(&a).unwrap().len(), 100);
    assert_eq!(fs::read(&b).unwrap().len(), 150);
}

#[cfg(unix)]
#[test]
fn test_link_pair_reports_existing_link() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.bin", &[6u8; 64]);
    let b = dir.path().join("b.bin");
    fs::hard_link(&a, &b).unwrap();

    let outcome = Linker::new(CancelToken::new()).link_pair(&a, &b, 64).unwrap();

    assert_eq!(outcome, LinkOutcome::AlreadyLinked);
}

#[test]
fn test_cancelled_linker_touches_nothing() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.bin", &[7u8; 512]);
    let b = write(dir.path(), "b.bin", &[7u8; 512]);
    let groups = scan(dir.path());

    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = Linker::new(cancel).link_groups(&groups);

    assert!(outcome.is_err());
    assert_eq!(fs::read(&b).unwrap(), vec![7u8; 512]);
}
