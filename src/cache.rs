//! Key-value caches for upstream API responses.
//!
//! Values are raw JSON documents keyed by a request-derived string (the artist
//! name for setlist.fm, the combined `"{song} {artist}"` query for track
//! search).  [`FileCache`] keeps the whole map in memory and writes it back as
//! a single pretty-printed JSON object.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Opaque key-value store.
pub trait Cache {
    /// Return the cached value, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store a value under `key`.
    fn set(&mut self, key: &str, value: Value);

    /// Flush pending changes.
    fn persist(&mut self) -> Result<()>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Cache that discards everything.
#[derive(Debug, Default)]
pub struct NullCache;

impl Cache for NullCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&mut self, _key: &str, _value: Value) {}

    fn persist(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory cache that never touches disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    data: HashMap<String, Value>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    fn persist(&mut self) -> Result<()> {
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

/// JSON-file backed cache.  With `auto_persist` every `set` rewrites the file.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    auto_persist: bool,
    data: HashMap<String, Value>,
}

impl FileCache {
    /// Open (or lazily create) a cache file.  A missing file yields an empty
    /// cache; an unreadable or corrupt one is an error.
    pub fn open(path: impl AsRef<Path>, auto_persist: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Using cache file {}", path.display());
        let data = load_map(&path)?;
        Ok(FileCache {
            path,
            auto_persist,
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn load_map(path: &Path) -> Result<HashMap<String, Value>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
        if self.auto_persist {
            if let Err(e) = self.persist() {
                warn!("Failed to save cache {}: {}", self.path.display(), e);
            }
        }
    }

    fn persist(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, json)?;
        debug!("Saved cache to {}", self.path.display());
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

/// Build a cache from a configured target.
///
/// `None`, `""`, `"none"`, `"null"` and `"memory"` give an in-memory cache;
/// anything else is treated as a file path.
pub fn create_cache(target: Option<&str>) -> Result<Box<dyn Cache>> {
    let name = match target {
        Some(t) => t.trim(),
        None => return Ok(Box::new(MemoryCache::new())),
    };
    match name.to_lowercase().as_str() {
        "" | "none" | "null" | "memory" => Ok(Box::new(MemoryCache::new())),
        _ => Ok(Box::new(FileCache::open(name, true)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_cache_discards() {
        let mut cache = NullCache;
        cache.set("k", json!(1));
        assert_eq!(cache.get("k"), None);
        assert!(!cache.contains("k"));
    }

    #[test]
    fn test_memory_cache_roundtrip() {
        let mut cache = MemoryCache::new();
        assert!(cache.is_empty());
        cache.set("Roundabout Yes", json!({"tracks": {"items": []}}));
        assert!(cache.contains("Roundabout Yes"));
        assert_eq!(cache.get("Roundabout Yes"), Some(json!({"tracks": {"items": []}})));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_file_cache_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        {
            let mut cache = FileCache::open(&path, true).unwrap();
            cache.set("Gojira", json!({"setlist": []}));
        }
        assert!(path.exists());

        let cache = FileCache::open(&path, true).unwrap();
        assert_eq!(cache.get("Gojira"), Some(json!({"setlist": []})));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_file_cache_without_auto_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = FileCache::open(&path, false).unwrap();
        cache.set("a", json!(true));
        assert!(!path.exists());
        cache.persist().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_cache_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json").unwrap();
        assert!(FileCache::open(&path, true).is_err());
    }

    #[test]
    fn test_create_cache_memory_aliases() {
        for target in [None, Some(""), Some("none"), Some("NULL"), Some(" memory ")] {
            let mut cache = create_cache(target).unwrap();
            cache.set("k", json!(1));
            assert_eq!(cache.get("k"), Some(json!(1)));
        }
    }
}
