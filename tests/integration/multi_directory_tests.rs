use dupelink::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use dupelink::scanner::WalkerConfig;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn finder() -> DuplicateFinder {
    DuplicateFinder::new(
        FinderConfig::default()
            .with_walker_config(WalkerConfig::default().with_minimal_size(0)),
    )
}

#[test]
fn test_duplicates_across_roots() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let a = first.path().join("a.bin");
    let b = second.path().join("b.bin");
    fs::write(&a, [1u8; 3000]).unwrap();
    fs::write(&b, [1u8; 3000]).unwrap();

    let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
    let (groups, stats) = finder().find_duplicates(&roots).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].origin(), &a);
    assert_eq!(groups[0].copies(), &[b]);
    assert_eq!(stats.files_selected, 2);
}

#[test]
fn test_root_order_decides_origin() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let a = first.path().join("z.bin");
    let b = second.path().join("a.bin");
    fs::write(&a, [2u8; 3000]).unwrap();
    fs::write(&b, [2u8; 3000]).unwrap();

    let roots = vec![second.path().to_path_buf(), first.path().to_path_buf()];
    let (groups, _) = finder().find_duplicates(&roots).unwrap();

    assert_eq!(groups[0].origin(), &b);
}

#[cfg(unix)]
#[test]
fn test_same_root_twice_does_not_duplicate() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("only.bin"), [3u8; 3000]).unwrap();

    let roots = vec![dir.path().to_path_buf(), dir.path().to_path_buf()];
    let (groups, stats) = finder().find_duplicates(&roots).unwrap();

    assert!(groups.is_empty());
    assert_eq!(stats.already_linked_files, 1);
}

#[test]
fn test_missing_second_root_fails_before_scanning() {
    let dir = tempdir().unwrap();
    let missing = PathBuf::from("/definitely/not/here");

    let err = finder()
        .find_duplicates(&[dir.path().to_path_buf(), missing.clone()])
        .unwrap_err();

    assert!(matches!(err, FinderError::PathNotFound(p) if p == missing));
}
