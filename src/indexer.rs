//! Full rebuilds and incremental refreshes of a [`DocumentIndex`].
//!
//! Only one rebuild or refresh runs at a time; a second caller gets
//! [`Error::RebuildInProgress`] instead of queueing. Files are read and
//! tokenized in parallel before the index write lock is taken, and every
//! run commits at most one batch, so the generation moves at most once.
//! A refresh with nothing to commit leaves the generation alone.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    incremental,
    index::{DocumentIndex, IndexBatch},
    ingestion::{self, LoadOutcome},
    source::FileSource,
    tokenizer::Tokenizer,
};

/// Summary of one rebuild or refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Documents in the index after the run.
    pub total_files: usize,
    /// Token occurrences across all indexed documents.
    pub total_tokens: usize,
    pub elapsed_ms: u64,
    /// Files read and (re)indexed by this run.
    pub indexed_files: usize,
    /// Documents dropped because their file vanished or turned binary.
    pub removed_files: usize,
    /// Binary files passed over.
    pub skipped_files: usize,
    /// Files that could not be read; their previous version, if any, is kept.
    pub failed_files: usize,
    /// Index generation after the run.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    Incremental,
}

/// Holds the single rebuild slot until dropped.
struct RebuildGuard<'a>(&'a AtomicBool);

impl<'a> RebuildGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RebuildInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builds and refreshes an index from a [`FileSource`].
pub struct Indexer {
    source: Box<dyn FileSource>,
    tokenizer: Tokenizer,
    running: AtomicBool,
}

impl Indexer {
    pub fn new(source: Box<dyn FileSource>, tokenizer: Tokenizer) -> Self {
        Self {
            source,
            tokenizer,
            running: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &dyn FileSource {
        self.source.as_ref()
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Whether a rebuild or refresh is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Re-read every indexable file and drop files that disappeared.
    ///
    /// If the tree cannot be listed at all the index is left untouched and
    /// the error is returned. Always bumps the generation exactly once.
    pub fn rebuild(&self, index: &DocumentIndex) -> Result<IndexStats> {
        self.run(index, Mode::Full)
    }

    /// Re-index only files whose mtime or size changed, add new files and
    /// drop deleted ones. Leaves the generation alone when nothing changed.
    pub fn refresh_if_stale(
        &self,
        index: &DocumentIndex,
    ) -> Result<IndexStats> {
        self.run(index, Mode::Incremental)
    }

    fn run(&self, index: &DocumentIndex, mode: Mode) -> Result<IndexStats> {
        let _guard = RebuildGuard::acquire(&self.running)?;
        let start = Instant::now();

        let discovered = self.source.list_tree()?;
        let known = incremental::known_files(&index.read());
        let diff = incremental::diff_files(&known, &discovered);
        debug!(
            ?mode,
            discovered = discovered.len(),
            new = diff.new_files.len(),
            changed = diff.changed_files.len(),
            deleted = diff.deleted_ids.len(),
            "compared tree against index"
        );

        if mode == Mode::Incremental && diff.is_empty() {
            return Ok(unchanged_stats(index, start));
        }

        let to_load = match mode {
            Mode::Full => discovered,
            Mode::Incremental => diff.files_to_index(),
        };
        let outcomes =
            ingestion::load_documents(self.source(), &self.tokenizer, &to_load);

        let mut batch = IndexBatch {
            removals: diff.deleted_ids,
            mark_built: true,
            ..Default::default()
        };
        let mut skipped_files = 0;
        let mut failed_files = 0;

        for outcome in outcomes {
            match outcome {
                LoadOutcome::Ready(doc) => batch.upserts.push(doc),
                LoadOutcome::Binary { path, id } => {
                    debug!(%path, "skipping binary file");
                    if known.contains_key(&path) {
                        batch.removals.push(id);
                    }
                    skipped_files += 1;
                }
                LoadOutcome::Failed { path, error } => {
                    warn!(%path, %error, "failed to index file");
                    failed_files += 1;
                }
            }
        }

        // Binary or unreadable files seen again on a refresh change nothing.
        if mode == Mode::Incremental && batch.is_empty() {
            debug!(
                skipped_files,
                failed_files,
                "refresh had nothing to commit"
            );
            return Ok(IndexStats {
                skipped_files,
                failed_files,
                ..unchanged_stats(index, start)
            });
        }

        let indexed_files = batch.upserts.len();
        let removed_files = batch.removals.len();
        let generation = index.apply(batch);

        let state = index.read();
        let stats = IndexStats {
            total_files: state.len(),
            total_tokens: state.total_tokens(),
            elapsed_ms: elapsed_ms(start),
            indexed_files,
            removed_files,
            skipped_files,
            failed_files,
            generation,
        };
        drop(state);

        info!(
            ?mode,
            files = stats.total_files,
            tokens = stats.total_tokens,
            indexed = stats.indexed_files,
            removed = stats.removed_files,
            failed = stats.failed_files,
            elapsed_ms = stats.elapsed_ms,
            generation,
            "index updated"
        );
        Ok(stats)
    }
}

/// Stats for a run that left the index as it was.
fn unchanged_stats(index: &DocumentIndex, start: Instant) -> IndexStats {
    let state = index.read();
    IndexStats {
        total_files: state.len(),
        total_tokens: state.total_tokens(),
        elapsed_ms: elapsed_ms(start),
        generation: state.generation(),
        ..Default::default()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
