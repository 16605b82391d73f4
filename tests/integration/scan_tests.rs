use dupelink::duplicates::{DuplicateFinder, FinderConfig};
use dupelink::scanner::{HasherConfig, LinkPolicy, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn finder(minimal_size: u64) -> DuplicateFinder {
    DuplicateFinder::new(
        FinderConfig::default()
            .with_walker_config(WalkerConfig::default().with_minimal_size(minimal_size)),
    )
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();

    let (groups, stats) = finder(0).find_duplicates(&[dir.path().to_path_buf()]).unwrap();

    assert!(groups.is_empty());
    assert_eq!(stats.files_examined, 0);
    assert_eq!(stats.duplicate_groups, 0);
}

#[test]
fn test_scan_unique_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"content a");
    write(dir.path(), "b.txt", b"content b");
    write(dir.path(), "c.txt", b"content c");

    let (groups, stats) = finder(0).find_duplicates(&[dir.path().to_path_buf()]).unwrap();

    assert!(groups.is_empty());
    assert_eq!(stats.files_selected, 3);
    assert_eq!(stats.size_candidates, 3);
}

#[test]
fn test_scan_duplicate_files() {
    let dir = tempdir().unwrap();
    let content = vec![7u8; 2000];
    let a = write(dir.path(), "a.bin", &content);
    let b = write(dir.path(), "b.bin", &content);
    write(dir.path(), "c.bin", &[8u8; 2000]);

    let (groups, stats) = finder(100).find_duplicates(&[dir.path().to_path_buf()]).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].origin(), &a);
    assert_eq!(groups[0].copies(), &[b]);
    assert_eq!(groups[0].size, 2000);
    assert_eq!(stats.duplicate_groups, 1);
    assert_eq!(stats.duplicate_files, 1);
    assert_eq!(stats.wasted_bytes, 2000);
}

#[test]
fn test_scan_nested_directories() {
    let dir = tempdir().unwrap();
    let content = vec![1u8; 5000];
    write(dir.path(), "top.bin", &content);
    write(dir.path(), "sub/deeper/nested.bin", &content);

    let (groups, _) = finder(0).find_duplicates(&[dir.path().to_path_buf()]).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[test]
fn test_minimal_size_is_exclusive() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.bin", &[3u8; 4096]);
    write(dir.path(), "b.bin", &[3u8; 4096]);

    let (groups, stats) = finder(4096).find_duplicates(&[dir.path().to_path_buf()]).unwrap();
    assert!(groups.is_empty());
    assert_eq!(stats.below_threshold, 2);

    let (groups, _) = finder(4095).find_duplicates(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(groups.len(), 1);
}

#[test]
fn test_blacklisted_directory_is_pruned() {
    let dir = tempdir().unwrap();
    let content = vec![9u8; 3000];
    write(dir.path(), "keep/a.bin", &content);
    write(dir.path(), ".git/objects/b.bin", &content);

    let config = FinderConfig::default().with_walker_config(
        WalkerConfig::default().with_blacklist([".git"]),
    );
    let (groups, stats) = DuplicateFinder::new(config)
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(stats.files_examined, 1);
}

#[test]
fn test_large_files_need_full_hash() {
    let dir = tempdir().unwrap();
    let mut left = vec![0u8; 300_000];
    let right = left.clone();
    write(dir.path(), "a.bin", &left);
    write(dir.path(), "b.bin", &right);
    left[150_000] = 1;
    write(dir.path(), "c.bin", &left);

    let (groups, stats) = finder(0).find_duplicates(&[dir.path().to_path_buf()]).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(stats.partial_candidates, 3);
    assert_eq!(stats.full_hash_skipped, 0);
    assert!(stats.full_bytes_read >= 900_000);
}

#[test]
fn test_without_tail_window_middle_difference_still_caught() {
    let dir = tempdir().unwrap();
    let base = vec![5u8; 10_000];
    let mut other = base.clone();
    other[9_999] = 6;
    write(dir.path(), "a.bin", &base);
    write(dir.path(), "b.bin", &other);

    let config = FinderConfig::default().with_hasher_config(HasherConfig {
        tail_window: false,
        ..HasherConfig::default()
    });
    let (groups, stats) = DuplicateFinder::new(config)
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(stats.partial_candidates, 2);
}

#[cfg(unix)]
#[test]
fn test_existing_links_skipped_by_default() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.bin", &[4u8; 2048]);
    fs::hard_link(&a, dir.path().join("b.bin")).unwrap();

    let (groups, stats) = finder(0).find_duplicates(&[dir.path().to_path_buf()]).unwrap();

    assert!(groups.is_empty());
    assert_eq!(stats.already_linked_files, 1);
    assert_eq!(stats.already_linked_bytes, 2048);
    assert_eq!(stats.files_selected, 1);
}

#[cfg(unix)]
#[test]
fn test_existing_links_reported_on_request() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.bin", &[4u8; 2048]);
    fs::hard_link(&a, dir.path().join("b.bin")).unwrap();

    let config = FinderConfig::default().with_walker_config(
        WalkerConfig::default().with_existing_links(LinkPolicy::Report),
    );
    let (groups, stats) = DuplicateFinder::new(config)
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(stats.already_linked_files, 1);
}

#[test]
fn test_groups_arrive_in_size_order() {
    let dir = tempdir().unwrap();
    write(dir.path(), "big1.bin", &[1u8; 9000]);
    write(dir.path(), "big2.bin", &[1u8; 9000]);
    write(dir.path(), "small1.bin", &[2u8; 100]);
    write(dir.path(), "small2.bin", &[2u8; 100]);

    let (groups, _) = finder(0).find_duplicates(&[dir.path().to_path_buf()]).unwrap();

    let sizes: Vec<u64> = groups.iter().map(|g| g.size).collect();
    assert_eq!(sizes, vec![100, 9000]);
}

#[test]
fn test_repeated_scans_agree() {
    let dir = tempdir().unwrap();
    let big = vec![1u8; 5000];
    let mut tail_differs = vec![2u8; 5000];
    write(dir.path(), "top/a.bin", &big);
    write(dir.path(), "top/deep/er/a.bin", &big);
    write(dir.path(), "z/a-copy.bin", &big);
    write(dir.path(), "m/one.txt", b"small duplicate");
    write(dir.path(), "n/two.txt", b"small duplicate");
    write(dir.path(), "top/t1.bin", &tail_differs);
    tail_differs[4999] = 3;
    write(dir.path(), "top/deep/t2.bin", &tail_differs);
    write(dir.path(), "x/t3.bin", &tail_differs);
    write(dir.path(), "unique.bin", &[9u8; 300]);

    let roots = [dir.path().to_path_buf()];
    let (first, _) = finder(0).find_duplicates(&roots).unwrap();
    let (second, _) = finder(0).find_duplicates(&roots).unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    let origins: Vec<&PathBuf> = first.iter().map(|g| g.origin()).collect();
    let origins_again: Vec<&PathBuf> = second.iter().map(|g| g.origin()).collect();
    assert_eq!(origins, origins_again);
}
