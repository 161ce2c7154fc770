//! Tests for merge (compaction)
//!
//! These tests verify:
//! - Visible state is identical before and after a merge
//! - The merged log holds exactly one frame per live key
//! - Empty and all-deleted logs
//! - The store keeps working (and reopens) after a merge
//! - A failed merge leaves the original log in place

use std::collections::HashMap;
use std::fs;

use logkv::log::{AppendLog, Entry, Marker};
use logkv::{Store, SyncStrategy};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(temp_dir.path()).unwrap();
    (temp_dir, store)
}

fn frames_on_disk(store: &Store) -> Vec<Entry> {
    let log = AppendLog::open_or_create(&store.log_path(), SyncStrategy::OsBuffered).unwrap();
    log.iter().map(|r| r.unwrap().1).collect()
}

fn snapshot(store: &Store, keys: &[&[u8]]) -> HashMap<Vec<u8>, Option<Vec<u8>>> {
    keys.iter()
        .map(|k| (k.to_vec(), store.get(k).unwrap()))
        .collect()
}

// =============================================================================
// Basic Merge Tests
// =============================================================================

#[test]
fn test_merge_concrete_scenario() {
    let (_temp, store) = setup_temp_store();

    store.put(b"a", b"1").unwrap();
    store.put(b"b", b"2").unwrap();
    store.delete(b"a").unwrap();
    store.put(b"a", b"3").unwrap();

    assert_eq!(store.get(b"a").unwrap(), Some(b"3".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));

    let report = store.merge().unwrap();

    assert_eq!(report.frames_before, 4);
    assert_eq!(report.frames_after, 2);

    let frames = frames_on_disk(&store);
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.marker == Marker::Put));
    assert_eq!(frames[0], Entry::put(b"b".to_vec(), b"2".to_vec()));
    assert_eq!(frames[1], Entry::put(b"a".to_vec(), b"3".to_vec()));

    assert_eq!(store.get(b"a").unwrap(), Some(b"3".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_merge_empty_log_is_noop() {
    let (_temp, store) = setup_temp_store();

    let report = store.merge().unwrap();

    assert_eq!(report.frames_before, 0);
    assert_eq!(report.frames_after, 0);
    assert!(store.log_path().exists());
}

#[test]
fn test_merge_preserves_visible_state() {
    let (_temp, store) = setup_temp_store();
    let keys: Vec<Vec<u8>> = (0..20).map(|i| format!("key{}", i).into_bytes()).collect();

    for round in 0..5 {
        for (i, key) in keys.iter().enumerate() {
            if (i + round) % 4 == 0 {
                store.delete(key).unwrap();
            } else {
                store.put(key, format!("r{}_{}", round, i).as_bytes()).unwrap();
            }
        }
    }

    let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
    let before = snapshot(&store, &key_refs);
    let live = store.len();

    store.merge().unwrap();

    assert_eq!(snapshot(&store, &key_refs), before);
    assert_eq!(frames_on_disk(&store).len(), live);
    assert_eq!(store.len(), live);
}

#[test]
fn test_merge_shrinks_log() {
    let (_temp, store) = setup_temp_store();

    for i in 0..100 {
        store.put(b"hot", format!("value{}", i).as_bytes()).unwrap();
    }
    let size_before = store.stats().log_size;

    let report = store.merge().unwrap();

    let expected = Entry::put(b"hot".to_vec(), b"value99".to_vec()).encoded_size();
    assert_eq!(report.bytes_before, size_before);
    assert_eq!(report.bytes_after, expected);
    assert_eq!(report.bytes_reclaimed(), size_before - expected);
    assert_eq!(store.stats().log_size, expected);
    assert_eq!(fs::metadata(store.log_path()).unwrap().len(), expected);
}

#[test]
fn test_merge_all_deleted_leaves_empty_log() {
    let (_temp, store) = setup_temp_store();

    store.put(b"a", b"1").unwrap();
    store.put(b"b", b"2").unwrap();
    store.delete(b"a").unwrap();
    store.delete(b"b").unwrap();

    let report = store.merge().unwrap();

    assert_eq!(report.frames_before, 4);
    assert_eq!(report.frames_after, 0);
    assert_eq!(store.stats().log_size, 0);
    assert!(frames_on_disk(&store).is_empty());
    assert_eq!(store.get(b"a").unwrap(), None);
}

#[test]
fn test_merge_removes_merge_file() {
    let (temp, store) = setup_temp_store();

    store.put(b"a", b"1").unwrap();
    store.put(b"a", b"2").unwrap();
    store.merge().unwrap();

    assert!(!temp.path().join(Store::MERGE_FILENAME).exists());
    assert!(temp.path().join(Store::LOG_FILENAME).exists());
}

#[test]
fn test_merge_twice_is_stable() {
    let (_temp, store) = setup_temp_store();

    store.put(b"a", b"1").unwrap();
    store.put(b"b", b"2").unwrap();
    store.put(b"a", b"3").unwrap();

    let first = store.merge().unwrap();
    let second = store.merge().unwrap();

    assert_eq!(first.frames_after, 2);
    assert_eq!(second.frames_before, 2);
    assert_eq!(second.frames_after, 2);
    assert_eq!(second.bytes_before, second.bytes_after);
}

// =============================================================================
// Post-Merge Operation Tests
// =============================================================================

#[test]
fn test_writes_after_merge() {
    let (_temp, store) = setup_temp_store();

    store.put(b"a", b"1").unwrap();
    store.put(b"a", b"2").unwrap();
    store.merge().unwrap();

    store.put(b"b", b"3").unwrap();
    store.delete(b"a").unwrap();

    assert_eq!(store.get(b"a").unwrap(), None);
    assert_eq!(store.get(b"b").unwrap(), Some(b"3".to_vec()));
    assert_eq!(frames_on_disk(&store).len(), 3);
}

#[test]
fn test_reopen_after_merge() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = Store::open(temp_dir.path()).unwrap();
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        store.delete(b"a").unwrap();
        store.put(b"a", b"3").unwrap();
        store.merge().unwrap();
        store.put(b"c", b"4").unwrap();
    }

    let store = Store::open(temp_dir.path()).unwrap();

    assert_eq!(store.get(b"a").unwrap(), Some(b"3".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(store.get(b"c").unwrap(), Some(b"4".to_vec()));
    assert_eq!(store.len(), 3);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[cfg(unix)]
#[test]
fn test_failed_merge_keeps_original_log() {
    let (temp, store) = setup_temp_store();

    store.put(b"a", b"1").unwrap();
    store.put(b"a", b"2").unwrap();
    store.put(b"b", b"3").unwrap();
    let size_before = store.stats().log_size;

    // A directory at the merge path makes creating the merge file fail
    let merge_path = temp.path().join(Store::MERGE_FILENAME);
    fs::create_dir(&merge_path).unwrap();

    assert!(store.merge().is_err());

    assert_eq!(store.stats().log_size, size_before);
    assert_eq!(frames_on_disk(&store).len(), 3);
    assert_eq!(store.get(b"a").unwrap(), Some(b"2".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), Some(b"3".to_vec()));

    // Still writable on the original log
    fs::remove_dir(&merge_path).unwrap();
    store.put(b"c", b"4").unwrap();
    store.merge().unwrap();
    assert_eq!(frames_on_disk(&store).len(), 3);
}
