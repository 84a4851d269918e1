use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{content_address, now_ms, BlobCodec, ContentCache, JsonCodec, Manifest, ManifestEntry};

/// Manifest document name under the cache root.
pub const MANIFEST_FILE: &str = "cache-manifest.json";

/// Environment override for the cache root.
pub const CACHE_DIR_ENV: &str = "CACHE_DIR";

const BLOB_EXTENSION: &str = "cache";

/// Filesystem cache backend. Blobs are written as
/// `<root>/<sha256-hex(key)>.cache`, encoded by the codec; the manifest is a
/// JSON document beside them.
pub struct FsCache<C: BlobCodec = JsonCodec> {
    root: PathBuf,
    codec: C,
}

impl FsCache {
    /// Root resolution order: explicit argument, `CACHE_DIR` environment
    /// variable, `<cwd>/.cache`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self::with_codec(root, JsonCodec)
    }
}

impl<C: BlobCodec> FsCache<C> {
    pub fn with_codec(root: Option<PathBuf>, codec: C) -> Self {
        let root = root
            .or_else(|| env::var_os(CACHE_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| {
                env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(".cache")
            });
        Self { root, codec }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// A missing or unparseable manifest reads as empty; the cache is always
    /// allowed to be cold.
    fn read_manifest(&self) -> Manifest {
        match fs::read(self.manifest_path()) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(root = %self.root.display(), %err, "unparseable cache manifest; treating as empty");
                Manifest::new()
            }),
            Err(_) => Manifest::new(),
        }
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating cache root {}", self.root.display()))?;
        let bytes = serde_json::to_vec(manifest).context("encoding cache manifest")?;
        fs::write(self.manifest_path(), bytes)
            .with_context(|| format!("writing cache manifest under {}", self.root.display()))
    }
}

impl<C: BlobCodec> ContentCache for FsCache<C> {
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
            debug!(key, "cache entry expired; evicting manifest row");
            manifest.remove(key);
            self.write_manifest(&manifest)?;
            return Ok(None);
        }
        let bytes = match fs::read(self.root.join(&entry.file)) {
            Ok(bytes) => bytes,
            // a vanished blob is a miss, not an error
            Err(_) => return Ok(None),
        };
        let value: T = match self.codec.decode(&bytes) {
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
        let file = format!("{}.{}", content_address(key), BLOB_EXTENSION);
        let bytes = self
            .codec
            .encode(value)
            .with_context(|| format!("encoding cache value for \"{}\"", key))?;
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating cache root {}", self.root.display()))?;
        fs::write(self.root.join(&file), bytes)
            .with_context(|| format!("writing cache blob {}", file))?;
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
        let manifest_path = self.manifest_path();
        if !manifest_path.exists() {
            return Ok(());
        }
        let manifest = self.read_manifest();
        for entry in manifest.values() {
            // one undeletable blob must not stop the rest of the cleanup
            if let Err(err) = fs::remove_file(self.root.join(&entry.file)) {
                warn!(file = %entry.file, %err, "failed to delete cache blob");
            }
        }
        fs::remove_file(&manifest_path)
            .with_context(|| format!("deleting cache manifest {}", manifest_path.display()))
    }
}
