//! On-disk cache of the inverted index next to a search index file.
//!
//! Tokenizing every record on each start is the slow part of loading a large
//! site. The built [`InvertedIndex`] is stored as postcard at
//! `<index>.cache` together with a fingerprint of the index bytes and the
//! tokenizer settings; any change to either forces a rebuild.

use crate::error::{LoadError, Result};
use crate::record::IndexFile;
use crate::search::{InvertedIndex, QueryEngine, QueryOptions, Tokenizer, TokenizerConfig};
use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use xxhash_rust::xxh3::Xxh3;

/// Bumped whenever the cached layout changes.
const CACHE_VERSION: u32 = 1;

/// xxh3 digest of an index file plus the tokenizer settings it was built with.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn compute(index_bytes: &[u8], config: &TokenizerConfig) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(index_bytes);
        config.hash(&mut hasher);
        CACHE_VERSION.hash(&mut hasher);
        Self(hasher.digest())
    }

    /// Returns the fingerprint as a lowercase hexadecimal string
    pub fn as_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 16 {
            return Err(ParseFingerprintError::InvalidLength(s.len()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseFingerprintError::InvalidHex)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for fingerprint parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFingerprintError {
    #[error("invalid hexadecimal characters in fingerprint")]
    InvalidHex,
    #[error("invalid fingerprint length: expected 16 hex characters, got {0}")]
    InvalidLength(usize),
}

/// Snapshot written to `<index>.cache`.
#[derive(Debug, Serialize, Deserialize)]
struct CachedIndex {
    version: u32,
    fingerprint: Fingerprint,
    index: InvertedIndex,
}

/// Cache file location for an index file: `search_index.js.cache`.
pub fn cache_path(index_path: &Path) -> PathBuf {
    let mut path = index_path.as_os_str().to_owned();
    path.push(".cache");
    PathBuf::from(path)
}

/// Reads a cached index if it exists and matches `fingerprint`.
fn load_cached(path: &Path, fingerprint: Fingerprint, record_count: usize) -> Option<InvertedIndex> {
    let bytes = std::fs::read(path).ok()?;

    match postcard::from_bytes::<CachedIndex>(&bytes) {
        Ok(cached) if cached.version == CACHE_VERSION && cached.fingerprint == fingerprint => {
            if cached.index.record_count() == record_count {
                tracing::debug!("Using cached search index from {}", path.display());
                Some(cached.index)
            } else {
                tracing::warn!("Cached search index at {} has the wrong record count", path.display());
                None
            }
        }
        Ok(_) => {
            tracing::debug!("Cached search index at {} is stale", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Failed to deserialize cached index at {}: {}", path.display(), e);
            None
        }
    }
}

/// Writes the cache file. Failures only cost the next start a rebuild.
fn store_cached(path: &Path, fingerprint: Fingerprint, index: &InvertedIndex) {
    #[derive(Serialize)]
    struct CachedIndexRef<'a> {
        version: u32,
        fingerprint: Fingerprint,
        index: &'a InvertedIndex,
    }

    let snapshot = CachedIndexRef {
        version: CACHE_VERSION,
        fingerprint,
        index,
    };

    let result = postcard::to_stdvec(&snapshot)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| std::fs::write(path, bytes).map_err(anyhow::Error::from));

    match result {
        Ok(()) => tracing::debug!("Cached search index to {}", path.display()),
        Err(e) => {
            tracing::warn!("Failed to write search index cache to {}: {}", path.display(), e);
            if let Err(e) = std::fs::remove_file(path) {
                tracing::debug!("No partial cache to remove at {}: {}", path.display(), e);
            }
        }
    }
}

/// Loads an index file into a query engine, reusing `<index>.cache` when it
/// is still valid and refreshing it otherwise.
pub fn load_engine(index_path: &Path, config: TokenizerConfig, options: QueryOptions) -> Result<QueryEngine> {
    let bytes = std::fs::read(index_path).map_err(|error| LoadError::Io {
        path: index_path.to_path_buf(),
        error,
    })?;
    let input = std::str::from_utf8(&bytes)
        .with_context(|| format!("Search index {} is not UTF-8", index_path.display()))?;
    let file = IndexFile::parse(input)
        .with_context(|| format!("Failed to load search index {}", index_path.display()))?;

    let fingerprint = Fingerprint::compute(&bytes, &config);
    let cache = cache_path(index_path);

    let engine = match load_cached(&cache, fingerprint, file.docs.len()) {
        Some(index) => QueryEngine::with_index(file.docs, index, Tokenizer::new(config), options),
        None => {
            let engine = QueryEngine::new(file.docs, config, options);
            store_cached(&cache, fingerprint, engine.index());
            engine
        }
    };

    tracing::info!(
        "Loaded {} records from {}",
        engine.records().len(),
        index_path.display()
    );

    Ok(engine)
}
