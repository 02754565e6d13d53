//! docsift - fast keyword and fuzzy search over a local documentation tree.
//!
//! docsift walks a read-only directory of docs, builds an in-memory
//! inverted index of normalized tokens, and answers queries by file content,
//! file name, or both. Typos are tolerated through bounded edit-distance
//! matching against the index vocabulary, and results are cached until the
//! index changes.
//!
//! # Quick start
//!
//! ```no_run
//! use docsift::{EngineConfig, Query, SearchEngine, SearchType};
//!
//! let config = EngineConfig::resolve(None).unwrap();
//! let engine = SearchEngine::new(config).unwrap();
//! engine.rebuild_index().unwrap();
//!
//! let query = Query::new("instalation guide")
//!     .search_type(SearchType::Both)
//!     .extensions(["md"])
//!     .limit(10);
//!
//! let response = engine.search(&query).unwrap();
//! for r in &response.results {
//!     println!("{} ({:.3}, {})", r.path, r.score, r.match_kind);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod file_id;
pub mod fuzzy;
pub mod incremental;
pub mod index;
pub mod indexer;
pub mod ingestion;
pub mod mcp;
pub mod query;
pub mod refresher;
pub mod search;
pub mod security;
pub mod source;
pub mod text_util;
pub mod tokenizer;
pub mod walker;

pub use config::EngineConfig;
pub use engine::{IndexStatus, SearchEngine, SearchResponse};
pub use error::{Error, Result};
pub use file_id::FileId;
pub use index::DocumentIndex;
pub use indexer::IndexStats;
pub use query::{MatchKind, Query, ScoredResult, SearchType};
