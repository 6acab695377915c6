use depwatch::incremental::{AnalysisKind, CacheStore, SnapshotCache};
use std::fs;

#[test]
fn snapshot_cache_persists_entries_and_write_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");

    let deps = {
        let cache = SnapshotCache::new(&cache_dir).unwrap();
        let deps = cache.make_key(AnalysisKind::Dependencies, "abc");
        let metrics = cache.make_key(AnalysisKind::Metrics, "abc");
        cache.set(&deps, b"deps".to_vec()).unwrap();
        cache.set(&metrics, b"metrics".to_vec()).unwrap();
        cache.set(&deps, b"deps v2".to_vec()).unwrap();
        deps
    };

    let reopened = SnapshotCache::new(&cache_dir).unwrap();
    let keys = reopened.list_keys().unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].kind, "metrics_analysis");
    assert_eq!(keys[1], deps);
    assert_eq!(reopened.get(&deps).unwrap(), Some(b"deps v2".to_vec()));
}

#[test]
fn snapshot_cache_missing_key_is_none() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache = SnapshotCache::new(dir.path()).unwrap();

    let key = cache.make_key(AnalysisKind::Dependencies, "never-written");
    assert_eq!(cache.get(&key).unwrap(), None);
}

#[test]
fn snapshot_cache_survives_a_corrupt_manifest() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(dir.path().join("manifest.bincode"), [0xff, 0x01]).unwrap();

    let cache = SnapshotCache::new(dir.path()).unwrap();
    assert!(cache.list_keys().unwrap().is_empty());
}

#[test]
fn snapshot_cache_clear_removes_everything() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    let cache = SnapshotCache::new(&cache_dir).unwrap();
    let key = cache.make_key(AnalysisKind::Metrics, "r1");
    cache.set(&key, vec![1, 2, 3]).unwrap();

    cache.clear().unwrap();

    assert!(cache.list_keys().unwrap().is_empty());
    assert_eq!(cache.get(&key).unwrap(), None);
    assert!(SnapshotCache::new(&cache_dir).unwrap().list_keys().unwrap().is_empty());
}

#[test]
fn snapshot_cache_evicts_the_oldest_entries_beyond_the_cap() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache = SnapshotCache::new(dir.path()).unwrap().with_max_entries(3);
    let keys: Vec<_> = (0..5)
        .map(|n| cache.make_key(AnalysisKind::Dependencies, &format!("r{}", n)))
        .collect();
    for key in &keys {
        cache.set(key, b"snapshot".to_vec()).unwrap();
    }

    assert_eq!(cache.list_keys().unwrap(), keys[2..].to_vec());
    let entry_files = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("snapshot_"))
        .count();
    assert_eq!(entry_files, 3);

    let reopened = SnapshotCache::new(dir.path()).unwrap();
    assert_eq!(reopened.get(&keys[0]).unwrap(), None);
    assert_eq!(reopened.get(&keys[4]).unwrap(), Some(b"snapshot".to_vec()));
}
