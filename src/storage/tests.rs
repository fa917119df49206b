//! Storage Module Tests
//!
//! Validates the concurrent map and its snapshot persistence.
//!
//! ## Test Scopes
//! - **Basic operations**: read/write/delete/update semantics.
//! - **Concurrency**: parallel writers and readers on overlapping keys.
//! - **Snapshots**: store/load round trip, missing files, malformed files, composite keys.

#[cfg(test)]
mod tests {
    use crate::account::types::ClassId;
    use crate::storage::StoreError;
    use crate::storage::memory::ConcurrentMap;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestCourse {
        name: String,
        capacity: u32,
    }

    const THREAD_NUM: usize = 100;

    // ============================================================
    // BASIC OPERATIONS
    // ============================================================

    #[test]
    fn test_write_then_read() {
        let map: ConcurrentMap<String, TestCourse> = ConcurrentMap::new();
        let course = TestCourse {
            name: "Rust".to_string(),
            capacity: 30,
        };

        map.write("rust".to_string(), course.clone());

        assert_eq!(map.read(&"rust".to_string()), Some(course));
        assert!(map.contains(&"rust".to_string()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_read_missing_key() {
        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        assert!(map.read(&"nope".to_string()).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn test_write_overwrites() {
        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        map.write("k".to_string(), 1);
        map.write("k".to_string(), 2);
        assert_eq!(map.read(&"k".to_string()), Some(2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        map.write("a".to_string(), 1);

        assert!(map.delete(&"missing".to_string()).is_none());
        assert_eq!(map.delete(&"a".to_string()), Some(1));
        assert!(map.delete(&"a".to_string()).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn test_update_only_touches_present_keys() {
        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        map.write("a".to_string(), 1);

        let seen = map.update(&"a".to_string(), |v| {
            *v += 10;
            *v
        });
        assert_eq!(seen, Some(11));

        let missing = map.update(&"b".to_string(), |v| *v += 1);
        assert!(missing.is_none());
        assert!(!map.contains(&"b".to_string()), "update must not insert");
    }

    #[test]
    fn test_upsert_with_creates_then_modifies() {
        let map: ConcurrentMap<String, BTreeSet<String>> = ConcurrentMap::new();

        map.upsert_with("c".to_string(), BTreeSet::new, |set| {
            set.insert("s1".to_string())
        });
        map.upsert_with("c".to_string(), BTreeSet::new, |set| {
            set.insert("s2".to_string())
        });

        let set = map.read(&"c".to_string()).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_insert_if_absent() {
        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        assert!(map.insert_if_absent("k".to_string(), 1));
        assert!(!map.insert_if_absent("k".to_string(), 2));
        assert_eq!(map.read(&"k".to_string()), Some(1));
    }

    #[test]
    fn test_read_all_is_a_copy() {
        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        map.write("a".to_string(), 1);

        let mut snapshot = map.read_all();
        snapshot.insert("b".to_string(), 2);
        map.write("a".to_string(), 100);

        assert_eq!(snapshot.get("a"), Some(&1), "snapshot must not see later writes");
        assert!(!map.contains(&"b".to_string()), "snapshot must not leak into the map");
    }

    // ============================================================
    // CONCURRENCY
    // ============================================================

    #[test]
    fn test_concurrent_write_and_read() {
        let map: Arc<ConcurrentMap<String, usize>> = Arc::new(ConcurrentMap::new());

        let handles: Vec<_> = (0..THREAD_NUM)
            .map(|i| {
                let map = map.clone();
                thread::spawn(move || {
                    let key = format!("key-{}", i);
                    map.write(key.clone(), i);
                    assert_eq!(map.read(&key), Some(i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..THREAD_NUM {
            assert_eq!(map.read(&format!("key-{}", i)), Some(i));
        }
    }

    #[test]
    fn test_concurrent_delete_and_write() {
        let map: Arc<ConcurrentMap<String, usize>> = Arc::new(ConcurrentMap::new());
        for i in 0..THREAD_NUM {
            map.write(format!("key-{}", i), i);
        }

        let handles: Vec<_> = (0..THREAD_NUM * 2)
            .map(|i| {
                let map = map.clone();
                thread::spawn(move || {
                    if i % 2 == 0 {
                        let key = format!("key-{}", i / 2);
                        map.delete(&key);
                        assert!(map.read(&key).is_none());
                    } else {
                        let key = format!("key-{}", i + 200);
                        map.write(key.clone(), i + 200);
                        assert_eq!(map.read(&key), Some(i + 200));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.len(), THREAD_NUM);
    }

    #[test]
    fn test_concurrent_upsert_loses_nothing() {
        let map: Arc<ConcurrentMap<String, BTreeSet<String>>> = Arc::new(ConcurrentMap::new());

        let handles: Vec<_> = (0..THREAD_NUM)
            .map(|i| {
                let map = map.clone();
                thread::spawn(move || {
                    map.upsert_with("roster".to_string(), BTreeSet::new, |set| {
                        set.insert(format!("student-{}", i))
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.read(&"roster".to_string()).unwrap().len(), THREAD_NUM);
    }

    // ============================================================
    // SNAPSHOTS
    // ============================================================

    #[test]
    fn test_store_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");

        let map: ConcurrentMap<String, TestCourse> = ConcurrentMap::new();
        for i in 0..THREAD_NUM {
            map.write(
                format!("course-{}", i),
                TestCourse {
                    name: format!("Course {}", i),
                    capacity: i as u32,
                },
            );
        }
        map.store(&path).unwrap();

        let restored: ConcurrentMap<String, TestCourse> = ConcurrentMap::new();
        restored.load(&path).unwrap();

        assert_eq!(restored.read_all(), map.read_all());
    }

    #[test]
    fn test_store_load_empty_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");

        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        map.store(&path).unwrap();

        let restored: ConcurrentMap<String, u32> = ConcurrentMap::new();
        restored.write("stale".to_string(), 1);
        restored.load(&path).unwrap();

        assert!(restored.is_empty(), "load replaces the whole contents");
    }

    #[test]
    fn test_load_missing_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        map.write("kept".to_string(), 7);

        map.load(dir.path().join("does_not_exist.json")).unwrap();

        assert_eq!(map.read(&"kept".to_string()), Some(7));
    }

    #[test]
    fn test_load_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        map.write("kept".to_string(), 7);

        let result = map.load(&path);
        assert!(matches!(result, Err(StoreError::Decode { .. })));
        assert_eq!(map.read(&"kept".to_string()), Some(7), "failed load must not clobber");
    }

    #[test]
    fn test_composite_keys_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class_rosters.json");

        let map: ConcurrentMap<ClassId, BTreeSet<String>> = ConcurrentMap::new();
        let class = ClassId { grade: 1, class: 1 };
        let other = ClassId { grade: 12, class: 3 };
        map.upsert_with(class, BTreeSet::new, |s| s.insert("s1".to_string()));
        map.upsert_with(other, BTreeSet::new, |s| s.insert("s2".to_string()));
        map.store(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"1-1\""));
        assert!(raw.contains("\"12-3\""));

        let restored: ConcurrentMap<ClassId, BTreeSet<String>> = ConcurrentMap::new();
        restored.load(&path).unwrap();
        assert_eq!(restored.read_all(), map.read_all());
    }

    #[test]
    fn test_load_rejects_bad_composite_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class_rosters.json");
        std::fs::write(&path, br#"{"grade-one": []}"#).unwrap();

        let map: ConcurrentMap<ClassId, BTreeSet<String>> = ConcurrentMap::new();
        let result = map.load(&path);

        assert!(matches!(result, Err(StoreError::Key { .. })));
    }
}
