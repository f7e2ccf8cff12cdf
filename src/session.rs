//! Async front of the query engine for interactive use.
//!
//! Each keystroke in a search box submits a new query. A [`SearchSession`]
//! numbers queries with a generation, cancels the one still running when a
//! newer one arrives, and only hands back results that are still the newest.
//! Searches run on the blocking pool so scoring never stalls the runtime.

use crate::cache::load_engine;
use crate::error::{Result, SessionError};
use crate::search::{QueryEngine, QueryOptions, ScoredResult, TokenizerConfig};
use anyhow::Context;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Maximum number of recent query results kept in memory.
const LRU_CACHE_SIZE: usize = 64;

/// Result of submitting a query to a session.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// The query finished while it was still the newest one.
    Completed {
        generation: u64,
        results: Arc<Vec<ScoredResult>>,
    },
    /// A newer query arrived first; these results must not be shown.
    Superseded { generation: u64 },
}

impl SearchOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Completed { generation, .. } | Self::Superseded { generation } => *generation,
        }
    }

    pub fn results(&self) -> Option<&[ScoredResult]> {
        match self {
            Self::Completed { results, .. } => Some(results),
            Self::Superseded { .. } => None,
        }
    }
}

/// Shared state for one search box.
///
/// This is the central coordination point for:
/// - The loaded engine (replaced wholesale when a new index is loaded)
/// - Query generations and cancellation of the in-flight query
/// - Caching results of recent queries (LRU)
pub struct SearchSession {
    engine: RwLock<Option<Arc<QueryEngine>>>,

    /// Generation of the newest submitted query
    generation: AtomicU64,

    /// Cancellation token of the query currently running
    in_flight: Mutex<Option<CancellationToken>>,

    /// LRU cache of recent results, keyed by query text
    results: Mutex<LruCache<String, Arc<Vec<ScoredResult>>>>,
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("ready", &self.engine.try_read().is_ok_and(|engine| engine.is_some()))
            .finish_non_exhaustive()
    }
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchSession {
    /// Create a session with no index loaded.
    pub fn new() -> Self {
        Self {
            engine: RwLock::new(None),
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            results: Mutex::new(LruCache::new(
                NonZeroUsize::new(LRU_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Create a session around an engine that is already built.
    pub fn with_engine(engine: QueryEngine) -> Self {
        Self {
            engine: RwLock::new(Some(Arc::new(engine))),
            ..Self::new()
        }
    }

    /// Install a new engine, replacing the previous one.
    ///
    /// The running query is cancelled and cached results are dropped, since
    /// they refer to the old records.
    pub async fn load(&self, engine: QueryEngine) {
        *self.engine.write().await = Some(Arc::new(engine));
        self.results.lock().await.clear();
        if let Some(token) = self.in_flight.lock().await.take() {
            token.cancel();
        }
        tracing::debug!("Search session loaded a new index");
    }

    /// Load an index file (through the on-disk cache) on the blocking pool.
    pub async fn load_path(&self, path: PathBuf, config: TokenizerConfig, options: QueryOptions) -> Result<()> {
        let engine = tokio::task::spawn_blocking(move || load_engine(&path, config, options))
            .await
            .context("Index loading task panicked")??;
        self.load(engine).await;
        Ok(())
    }

    /// Whether a query can be answered yet.
    pub async fn is_ready(&self) -> bool {
        self.engine.read().await.is_some()
    }

    /// Generation of the newest submitted query (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_newest(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Submit a query, superseding any query still running.
    pub async fn search(&self, query: &str) -> std::result::Result<SearchOutcome, SessionError> {
        let Some(engine) = self.engine.read().await.clone() else {
            tracing::error!("Query '{}' submitted before the search index was loaded", query);
            return Err(SessionError::IndexNotLoaded);
        };

        // Generation and token change together, so the token in `in_flight`
        // always belongs to the newest generation.
        let token = CancellationToken::new();
        let generation = {
            let mut in_flight = self.in_flight.lock().await;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(previous) = in_flight.replace(token.clone()) {
                previous.cancel();
            }
            generation
        };

        let cached = self.results.lock().await.get(query).cloned();
        if let Some(results) = cached {
            tracing::debug!("Query '{}' answered from session cache", query);
            return Ok(self.deliver(generation, results));
        }

        let text = query.to_string();
        let top_k = engine.options().top_k;
        let task_token = token.clone();
        let start = std::time::Instant::now();
        let results = tokio::task::spawn_blocking(move || engine.search_cancellable(&text, top_k, &task_token))
            .await
            .map_err(|e| {
                tracing::error!("Search task for '{}' failed: {}", query, e);
                SessionError::SearchFailed
            })?;

        let Some(results) = results else {
            tracing::debug!("Query '{}' (generation {}) cancelled", query, generation);
            return Ok(SearchOutcome::Superseded { generation });
        };

        let results = Arc::new(results);
        self.results.lock().await.put(query.to_string(), results.clone());
        tracing::debug!(
            "Query '{}' (generation {}) scored {} results in {:?}",
            query,
            generation,
            results.len(),
            start.elapsed()
        );

        Ok(self.deliver(generation, results))
    }

    fn deliver(&self, generation: u64, results: Arc<Vec<ScoredResult>>) -> SearchOutcome {
        if self.is_newest(generation) {
            SearchOutcome::Completed { generation, results }
        } else {
            SearchOutcome::Superseded { generation }
        }
    }
}
