//! Content-addressed TTL cache for expensive network work: scraped download
//! URLs, raw source bodies and parsed rows. One manifest document per cache
//! root maps each logical key to its content address and absolute expiry;
//! the blobs themselves live under the hash of the key so arbitrary keys
//! (URLs, composite strings) never leak into storage names.

pub mod fs;
pub mod kv;

pub use fs::FsCache;
pub use kv::{KvCache, KvStore, MemoryStore};

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// One manifest row: content address plus expiry in epoch milliseconds.
/// Expiry is absolute so an entry stays correct no matter when it is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub expiry: i64,
}

/// The whole manifest is one document: logical key → entry. Keeping it in a
/// single document makes `clear` and iteration cheap.
pub type Manifest = HashMap<String, ManifestEntry>;

/// Hex SHA-256 of a logical key: fixed-length, collision-resistant, safe as a
/// file or storage name.
pub fn content_address(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Pluggable blob serializer for the filesystem backend.
pub trait BlobCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// Default codec: serde_json, which round-trips every value this crate
/// caches (strings, structs, row vectors, raw byte bodies).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl BlobCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Contract shared by both cache backends.
///
/// A cache is always allowed to be cold: unreadable manifests, missing blobs
/// and undecodable values all surface as `Ok(None)`, never as errors. Only
/// genuine write failures and transformer failures propagate.
pub trait ContentCache {
    /// Fetch a live value. Expired entries are evicted from the manifest as a
    /// side effect and read as a miss.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_with(key, Ok)
    }

    /// Like [`ContentCache::get`], but passes the decoded value through
    /// `transformer`. Transformer failures propagate to the caller.
    fn get_with<T, U, F>(&self, key: &str, transformer: F) -> Result<Option<U>>
    where
        T: DeserializeOwned,
        F: FnOnce(T) -> Result<U>;

    /// Persist `value` under the content address of `key` and write the
    /// manifest row. A non-positive `ttl_ms` produces an already-expired
    /// entry.
    fn set<T: Serialize>(&self, key: &str, value: &T, ttl_ms: i64) -> Result<()>;

    /// Delete the manifest and, best-effort, every blob it referenced.
    /// Idempotent: clearing a cache that has no manifest is a no-op.
    fn clear(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_address_is_hex_sha256() {
        // sha256("special-key")
        assert_eq!(
            content_address("special-key"),
            "23c12c57eb2cd9d091de03cf111041b766afe6b8eaa04ff38f71d1ac6ed26cef"
        );
        assert_eq!(content_address("").len(), 64);
    }

    #[test]
    fn json_codec_round_trips_structured_values() -> Result<()> {
        let codec = JsonCodec;
        let rows = vec![vec!["a".to_string(), "b".to_string()]];
        let bytes = codec.encode(&rows)?;
        let back: Vec<Vec<String>> = codec.decode(&bytes)?;
        assert_eq!(back, rows);
        Ok(())
    }
}
