use dupelink::duplicates::{group_by, CandidateKey, SpillConfig};
use dupelink::scanner::{Walker, WalkerConfig};
use dupelink::signal::CancelToken;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_group_by_matches_in_memory_partition(
        sizes in prop::collection::vec(0u64..20, 0..120),
        run_records in 1usize..16,
        fan_in in 2usize..6,
    ) {
        let records: Vec<(CandidateKey, PathBuf)> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| (CandidateKey::Size(size), PathBuf::from(format!("/f/{i:04}"))))
            .collect();

        let mut expected: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
        for (key, path) in &records {
            expected.entry(key.size()).or_default().push(path.clone());
        }
        expected.retain(|_, paths| paths.len() >= 2);

        let config = SpillConfig::default()
            .with_run_records(run_records)
            .with_merge_fan_in(fan_in);
        let groups: Vec<_> = group_by(&config, records)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        prop_assert_eq!(groups.len(), expected.len());
        for (group, (size, paths)) in groups.iter().zip(expected.iter()) {
            prop_assert_eq!(group.key.size(), *size);
            prop_assert_eq!(&group.paths, paths);
        }
    }

    #[test]
    fn test_walker_selects_strictly_above_threshold(
        sizes in prop::collection::vec(0usize..64, 1..12),
        threshold in 0u64..64,
    ) {
        let dir = TempDir::new().unwrap();
        for (i, &size) in sizes.iter().enumerate() {
            fs::write(dir.path().join(format!("f{i}")), vec![i as u8; size]).unwrap();
        }

        let config = WalkerConfig::default().with_minimal_size(threshold);
        let mut walker = Walker::new(vec![dir.path().to_path_buf()], config, CancelToken::new());
        let selected: Vec<u64> = walker.records().map(|r| r.unwrap().size).collect();

        let expected = sizes.iter().filter(|&&s| s as u64 > threshold).count();
        prop_assert_eq!(selected.len(), expected);
        prop_assert!(selected.iter().all(|&s| s > threshold));
        prop_assert_eq!(walker.counters().below_threshold, sizes.len() - expected);
    }
}
