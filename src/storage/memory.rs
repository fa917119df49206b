use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::hash::Hash;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use super::StoreError;

/// A thread-safe map guarded by a single reader/writer lock.
///
/// Readers never observe a half-applied write: every mutation runs under the
/// exclusive lock, and `read_all` copies the whole map out under the shared
/// lock. There is no atomicity across two maps; callers that must update
/// several maps together provide their own critical section.
///
/// Keys are persisted through `ToString` / `FromStr` so composite identifiers
/// can be used as JSON object keys.
pub struct ConcurrentMap<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: ToString + FromStr + Clone + Hash + Eq + Send + Sync,
    <K as FromStr>::Err: std::fmt::Display,
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn read(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }

    /// Upsert.
    pub fn write(&self, key: K, value: V) {
        self.data.write().insert(key, value);
    }

    /// Inserts only when the key is vacant. Returns `false` if it was taken.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut data = self.data.write();
        if data.contains_key(&key) {
            return false;
        }
        data.insert(key, value);
        true
    }

    /// Removes the key if present. Absent keys are not an error.
    pub fn delete(&self, key: &K) -> Option<V> {
        self.data.write().remove(key)
    }

    /// Applies `f` to the stored value in place, under the write lock.
    ///
    /// Returns `None` without calling `f` when the key is absent, so a
    /// read-modify-write can never resurrect an entry deleted concurrently.
    pub fn update<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.data.write().get_mut(key).map(f)
    }

    /// Entry-or-insert followed by an in-place modification, as one write.
    pub fn upsert_with<R>(
        &self,
        key: K,
        default: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> R {
        let mut data = self.data.write();
        f(data.entry(key).or_insert_with(default))
    }

    /// Point-in-time copy of the whole map.
    pub fn read_all(&self) -> HashMap<K, V> {
        self.data.read().clone()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Replaces the live contents with the snapshot stored at `path`.
    ///
    /// A missing file leaves the map untouched. The file is parsed before the
    /// write lock is taken, so a malformed snapshot never clobbers live data.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No snapshot at {}, keeping current state", path.display());
                return Ok(());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let raw: HashMap<String, V> =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        let mut loaded = HashMap::with_capacity(raw.len());
        for (key_str, value) in raw {
            let key: K = key_str.parse().map_err(|e: <K as FromStr>::Err| StoreError::Key {
                path: path.to_path_buf(),
                key: key_str.clone(),
                reason: e.to_string(),
            })?;
            loaded.insert(key, value);
        }

        let count = loaded.len();
        *self.data.write() = loaded;
        tracing::debug!("Loaded {} entries from {}", count, path.display());
        Ok(())
    }

    /// Writes a full snapshot to `path`, overwriting it.
    ///
    /// Serialization happens under the shared lock; the file is written after
    /// the lock is released.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let encoded = {
            let data = self.data.read();
            let ordered: BTreeMap<String, &V> =
                data.iter().map(|(k, v)| (k.to_string(), v)).collect();
            serde_json::to_vec_pretty(&ordered).map_err(StoreError::Encode)?
        };

        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = fs::File::create(path).map_err(io_err)?;
        file.write_all(&encoded).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok(())
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: ToString + FromStr + Clone + Hash + Eq + Send + Sync,
    <K as FromStr>::Err: std::fmt::Display,
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
