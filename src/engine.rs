use std::{sync::Arc, time::Instant};

use serde::Serialize;
use tracing::debug;

use crate::{
    cache::{CacheStats, QueryCache},
    config::EngineConfig,
    error::Result,
    index::DocumentIndex,
    indexer::{IndexStats, Indexer},
    query::{Query, ScoredResult},
    search::execute_search,
    source::{FileSource, FsSource},
};

/// Ranked results of one search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<ScoredResult>,
    pub took_ms: u64,
    /// Index generation the results were computed against.
    pub generation: u64,
    pub cached: bool,
}

/// Snapshot of the engine's index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    /// Whether at least one build has completed.
    pub indexed: bool,
    pub root: String,
    pub total_files: usize,
    pub total_tokens: usize,
    pub vocabulary_size: usize,
    pub generation: u64,
    /// Seconds since the Unix epoch.
    pub last_built_at: Option<u64>,
    pub rebuilding: bool,
    pub cache: CacheStats,
}

/// The search engine: an index, its builder and a query cache over one
/// documentation root.
///
/// All methods take `&self`; share the engine across threads with an
/// [`Arc`].
///
/// # Examples
///
/// ```no_run
/// use docsift::{EngineConfig, Query, SearchEngine};
///
/// let config = EngineConfig::resolve(None).unwrap();
/// let engine = SearchEngine::new(config).unwrap();
/// engine.rebuild_index().unwrap();
///
/// let response = engine.search(&Query::new("install guide")).unwrap();
/// for r in &response.results {
///     println!("{} ({:.3})", r.path, r.score);
/// }
/// ```
pub struct SearchEngine {
    config: EngineConfig,
    index: DocumentIndex,
    cache: QueryCache,
    indexer: Indexer,
}

impl SearchEngine {
    /// An engine reading from the filesystem under `config.root`.
    ///
    /// The index starts empty; call [`rebuild_index`](Self::rebuild_index).
    pub fn new(config: EngineConfig) -> Result<Self> {
        let source = FsSource::new(&config.root, config.walk.clone())?;
        Ok(Self::with_source(config, Box::new(source)))
    }

    pub fn with_source(
        config: EngineConfig,
        source: Box<dyn FileSource>,
    ) -> Self {
        let indexer = Indexer::new(source, config.tokenizer());
        Self {
            cache: QueryCache::new(config.cache_capacity),
            index: DocumentIndex::new(),
            indexer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    /// Validate and run a query, serving from the cache when the index has
    /// not changed since the same query last ran.
    pub fn search(&self, query: &Query) -> Result<SearchResponse> {
        query.validate()?;
        let start = Instant::now();
        let key = query.key();

        let current = self.index.generation();
        if let Some(results) = self.cache.get(&key, current) {
            debug!(query = %query.text, generation = current, "cache hit");
            return Ok(SearchResponse {
                results: results.to_vec(),
                took_ms: elapsed_ms(start),
                generation: current,
                cached: true,
            });
        }

        let state = self.index.read();
        let generation = state.generation();
        let results: Arc<[ScoredResult]> = execute_search(
            &state,
            query,
            self.indexer.tokenizer(),
            &self.config.limits,
        )
        .into();
        drop(state);

        self.cache.put(key, generation, Arc::clone(&results));
        let took_ms = elapsed_ms(start);
        debug!(
            query = %query.text,
            results = results.len(),
            generation,
            took_ms,
            "search"
        );

        Ok(SearchResponse {
            results: results.to_vec(),
            took_ms,
            generation,
            cached: false,
        })
    }

    /// Rebuild the whole index from disk.
    pub fn rebuild_index(&self) -> Result<IndexStats> {
        self.indexer.rebuild(&self.index)
    }

    /// Re-index only what changed on disk.
    pub fn refresh_if_stale(&self) -> Result<IndexStats> {
        self.indexer.refresh_if_stale(&self.index)
    }

    pub fn index_status(&self) -> IndexStatus {
        let state = self.index.read();
        IndexStatus {
            indexed: state.last_built_at().is_some(),
            root: self.indexer.source().root().display().to_string(),
            total_files: state.len(),
            total_tokens: state.total_tokens(),
            vocabulary_size: state.vocabulary_len(),
            generation: state.generation(),
            last_built_at: state.last_built_at(),
            rebuilding: self.indexer.is_running(),
            cache: self.cache.stats(),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
