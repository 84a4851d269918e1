use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::{content_address, now_ms, ContentCache, Manifest, ManifestEntry};

/// Store key holding the manifest document.
pub const MANIFEST_KEY: &str = "cache-manifest";

const BLOB_KEY_PREFIX: &str = "cache_";

/// Minimal string key-value surface the storage-backed cache runs on. This
/// is the seam an embedding application implements over its own persistent
/// storage.
pub trait KvStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// In-process [`KvStore`], mainly for embedding without persistence and for
/// tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().expect("store lock poisoned").get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.lock().expect("store lock poisoned").remove(key);
    }
}

/// Key-value storage cache backend. The manifest lives under one fixed store
/// key; each blob is its own entry under `cache_<sha256-hex(key)>`, encoded
/// as a JSON string.
pub struct KvCache<S: KvStore> {
    store: S,
}

impl<S: KvStore> KvCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read_manifest(&self) -> Manifest {
        match self.store.get_item(MANIFEST_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(%err, "unparseable cache manifest; treating as empty");
                Manifest::new()
            }),
            None => Manifest::new(),
        }
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let raw = serde_json::to_string(manifest).context("encoding cache manifest")?;
        self.store.set_item(MANIFEST_KEY, &raw);
        Ok(())
    }
}

impl<S: KvStore> ContentCache for KvCache<S> {
    fn get_with<T, U, F>(&self, key: &str, transformer: F) -> Result<Option<U>>
    where
        T: DeserializeOwned,
        F: FnOnce(T) -> Result<U>,
    {
        let mut manifest = self.read_manifest();
        let Some(entry) = manifest.get(key) else {
            return Ok(None);
        };
        if now_ms() > entry.expiry {
            debug!(key, "cache entry expired; evicting manifest row and blob");
            let file = entry.file.clone();
            manifest.remove(key);
            self.write_manifest(&manifest)?;
            self.store.remove_item(&file);
            return Ok(None);
        }
        let Some(raw) = self.store.get_item(&entry.file) else {
            return Ok(None);
        };
        let value: T = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                debug!(key, %err, "cache blob failed to decode; treating as miss");
                return Ok(None);
            }
        };
        transformer(value).map(Some)
    }

    fn set<T: Serialize>(&self, key: &str, value: &T, ttl_ms: i64) -> Result<()> {
        let mut manifest = self.read_manifest();
        let file = format!("{}{}", BLOB_KEY_PREFIX, content_address(key));
        let raw = serde_json::to_string(value)
            .with_context(|| format!("encoding cache value for \"{}\"", key))?;
        self.store.set_item(&file, &raw);
        manifest.insert(
            key.to_string(),
            ManifestEntry {
                file,
                expiry: now_ms() + ttl_ms,
            },
        );
        self.write_manifest(&manifest)
    }

    fn clear(&self) -> Result<()> {
        let manifest = self.read_manifest();
        for entry in manifest.values() {
            self.store.remove_item(&entry.file);
        }
        self.store.remove_item(MANIFEST_KEY);
        Ok(())
    }
}
