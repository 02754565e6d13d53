//! The in-memory inverted index.
//!
//! All state lives behind one [`RwLock`]: queries hold a read guard for the
//! whole scoring pass, and writers swap documents in under a short write
//! lock. Documents are tokenized *before* the lock is taken (see
//! [`PreparedDocument`]), so no file I/O or tokenization ever happens while
//! readers are blocked.
//!
//! Every posting refers to a document present in the document table, and
//! every token in the vocabulary has at least one posting. The generation
//! counter increments once per committed write.
//!
//! Large batches yield the write lock to waiting readers every
//! [`COMMIT_CHUNK`] documents. Each document is swapped in whole, so a
//! reader may see a batch partly applied but never a partly replaced
//! document. The generation only moves once the whole batch is in, so
//! results cached mid-batch are discarded afterwards.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{Error, Result},
    file_id::FileId,
    tokenizer::Token,
};

/// Documents inserted between chances for readers to take the lock.
pub const COMMIT_CHUNK: usize = 64;

/// Metadata recorded for each indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    /// Normalized path relative to the indexed root.
    pub path: String,
    /// Lowercase extension without the dot, empty when there is none.
    pub extension: String,
    pub title: String,
    pub size_bytes: u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub mtime: u64,
    pub token_count: usize,
    /// When the file was indexed, in seconds since the Unix epoch.
    pub indexed_at: u64,
}

/// A document whose tokens have already been computed, ready to be
/// inserted under the write lock.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub id: FileId,
    pub meta: DocumentMeta,
    text: String,
    postings: HashMap<String, Vec<usize>>,
}

impl PreparedDocument {
    /// Build a prepared document from its token stream.
    ///
    /// `meta.token_count` is overwritten with the number of tokens seen.
    pub fn from_tokens(
        id: FileId,
        mut meta: DocumentMeta,
        text: String,
        tokens: impl IntoIterator<Item = Token>,
    ) -> Self {
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();
        let mut count = 0;
        for token in tokens {
            postings.entry(token.text).or_default().push(token.offset);
            count += 1;
        }
        for positions in postings.values_mut() {
            positions.sort_unstable();
        }
        meta.token_count = count;
        Self {
            id,
            meta,
            text,
            postings,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A document as stored in the index.
#[derive(Debug)]
pub struct IndexedDocument {
    pub id: FileId,
    pub meta: DocumentMeta,
    pub text: String,
    terms: Vec<String>,
}

/// Occurrences of one token in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub file_id: FileId,
    /// Ascending byte offsets into the file's text.
    pub positions: Vec<usize>,
}

/// Snapshot-able index contents. Obtain via [`DocumentIndex::read`].
#[derive(Debug, Default)]
pub struct IndexState {
    generation: u64,
    last_built_at: Option<u64>,
    documents: HashMap<FileId, Arc<IndexedDocument>>,
    postings: HashMap<String, HashMap<FileId, Vec<usize>>>,
    paths: HashMap<String, FileId>,
    total_tokens: usize,
}

impl IndexState {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_built_at(&self) -> Option<u64> {
        self.last_built_at
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn vocabulary_len(&self) -> usize {
        self.postings.len()
    }

    pub fn document(&self, id: FileId) -> Option<&Arc<IndexedDocument>> {
        self.documents.get(&id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Arc<IndexedDocument>> {
        self.documents.values()
    }

    pub fn file_id_for_path(&self, path: &str) -> Option<FileId> {
        self.paths.get(path).copied()
    }

    /// Postings for an exact normalized token.
    pub fn postings(
        &self,
        token: &str,
    ) -> Option<&HashMap<FileId, Vec<usize>>> {
        self.postings.get(token)
    }

    /// Every distinct token currently present in the index.
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(String::as_str)
    }

    /// Verify the cross-table invariants. Any error here is a bug.
    pub fn check_invariants(&self) -> Result<()> {
        for (token, files) in &self.postings {
            if files.is_empty() {
                return Err(Error::Corrupted(format!(
                    "token {token:?} has no postings"
                )));
            }
            for (id, positions) in files {
                if !self.documents.contains_key(id) {
                    return Err(Error::Corrupted(format!(
                        "token {token:?} refers to unknown file {id}"
                    )));
                }
                if positions.windows(2).any(|w| w[0] > w[1]) {
                    return Err(Error::Corrupted(format!(
                        "positions for {token:?} in {id} are not sorted"
                    )));
                }
            }
        }
        for (path, id) in &self.paths {
            match self.documents.get(id) {
                Some(doc) if doc.meta.path == *path => {}
                _ => {
                    return Err(Error::Corrupted(format!(
                        "path {path} maps to a missing document"
                    )));
                }
            }
        }
        let tokens: usize =
            self.documents.values().map(|d| d.meta.token_count).sum();
        if tokens != self.total_tokens {
            return Err(Error::Corrupted(format!(
                "token total {} disagrees with documents ({tokens})",
                self.total_tokens
            )));
        }
        Ok(())
    }

    fn insert(&mut self, doc: PreparedDocument) {
        self.remove(doc.id);

        let PreparedDocument {
            id,
            meta,
            text,
            postings,
        } = doc;

        let mut terms = Vec::with_capacity(postings.len());
        for (token, positions) in postings {
            self.postings
                .entry(token.clone())
                .or_default()
                .insert(id, positions);
            terms.push(token);
        }

        self.total_tokens += meta.token_count;
        self.paths.insert(meta.path.clone(), id);
        self.documents.insert(
            id,
            Arc::new(IndexedDocument {
                id,
                meta,
                text,
                terms,
            }),
        );
    }

    fn remove(&mut self, id: FileId) -> bool {
        let Some(doc) = self.documents.remove(&id) else {
            return false;
        };
        for term in &doc.terms {
            if let Some(files) = self.postings.get_mut(term) {
                files.remove(&id);
                if files.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.total_tokens -= doc.meta.token_count;
        if self.paths.get(&doc.meta.path) == Some(&id) {
            self.paths.remove(&doc.meta.path);
        }
        true
    }
}

/// A set of changes applied atomically with a single generation bump.
#[derive(Debug, Default)]
pub struct IndexBatch {
    pub upserts: Vec<PreparedDocument>,
    pub removals: Vec<FileId>,
    /// Record the commit time as the index's last build time.
    pub mark_built: bool,
}

impl IndexBatch {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Thread-safe inverted index over a document tree.
#[derive(Debug, Default)]
pub struct DocumentIndex {
    state: RwLock<IndexState>,
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a consistent read view. Hold it only while scoring.
    pub fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    /// Insert or replace one document. Returns the new generation.
    pub fn upsert_document(&self, doc: PreparedDocument) -> u64 {
        self.apply(IndexBatch {
            upserts: vec![doc],
            ..Default::default()
        })
    }

    /// Remove a document and all of its postings.
    ///
    /// Returns `false` (and leaves the generation alone) when the file was
    /// not indexed.
    pub fn remove_document(&self, id: FileId) -> bool {
        let mut state = self.state.write();
        let removed = state.remove(id);
        if removed {
            state.generation += 1;
        }
        removed
    }

    /// Apply a batch under one write lock, bumping the generation once.
    pub fn apply(&self, batch: IndexBatch) -> u64 {
        let IndexBatch {
            upserts,
            removals,
            mark_built,
        } = batch;
        let (upserted, removed) = (upserts.len(), removals.len());

        let mut state = self.state.write();
        for id in removals {
            state.remove(id);
        }
        for (i, doc) in upserts.into_iter().enumerate() {
            if i > 0 && i % COMMIT_CHUNK == 0 {
                RwLockWriteGuard::bump(&mut state);
            }
            state.insert(doc);
        }
        if mark_built {
            state.last_built_at = Some(unix_now());
        }
        state.generation += 1;

        debug!(
            generation = state.generation,
            upserted,
            removed,
            documents = state.documents.len(),
            "committed index batch"
        );
        state.generation
    }

    /// Postings for an exact normalized token, ordered by file id.
    pub fn lookup_exact(&self, token: &str) -> Vec<Posting> {
        let state = self.state.read();
        let mut postings: Vec<Posting> = state
            .postings(token)
            .map(|files| {
                files
                    .iter()
                    .map(|(id, positions)| Posting {
                        file_id: *id,
                        positions: positions.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        postings.sort_by_key(|p| p.file_id);
        postings
    }

    /// Sorted copy of the vocabulary.
    pub fn vocabulary(&self) -> Vec<String> {
        let state = self.state.read();
        let mut words: Vec<String> =
            state.vocabulary().map(str::to_string).collect();
        words.sort_unstable();
        words
    }

    pub fn document_meta(&self, id: FileId) -> Option<DocumentMeta> {
        self.state.read().document(id).map(|doc| doc.meta.clone())
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    pub(crate) fn prepared(path: &str, text: &str) -> PreparedDocument {
        let meta = DocumentMeta {
            path: path.to_string(),
            extension: path
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_string())
                .unwrap_or_default(),
            title: path.to_string(),
            size_bytes: text.len() as u64,
            mtime: 1,
            token_count: 0,
            indexed_at: 0,
        };
        PreparedDocument::from_tokens(
            FileId::for_path(path),
            meta,
            text.to_string(),
            Tokenizer::default().tokenize(text),
        )
    }

    #[test]
    fn upsert_then_lookup() {
        let index = DocumentIndex::new();
        index.upsert_document(prepared("a.md", "alpha beta alpha"));

        let postings = index.lookup_exact("alpha");
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].file_id, FileId::for_path("a.md"));
        assert_eq!(postings[0].positions, vec![0, 11]);
        assert!(index.lookup_exact("gamma").is_empty());
    }

    #[test]
    fn token_count_is_recorded() {
        let index = DocumentIndex::new();
        index.upsert_document(prepared("a.md", "one two three two"));
        let meta = index.document_meta(FileId::for_path("a.md")).unwrap();
        assert_eq!(meta.token_count, 4);
        assert_eq!(index.read().total_tokens(), 4);
    }

    #[test]
    fn replacing_a_document_drops_stale_tokens() {
        let index = DocumentIndex::new();
        index.upsert_document(prepared("a.md", "old words"));
        index.upsert_document(prepared("a.md", "new words"));

        assert!(index.lookup_exact("old").is_empty());
        assert_eq!(index.lookup_exact("new").len(), 1);
        assert_eq!(index.lookup_exact("words").len(), 1);
        assert_eq!(index.len(), 1);
        assert!(!index.vocabulary().contains(&"old".to_string()));
        index.read().check_invariants().unwrap();
    }

    #[test]
    fn remove_document_clears_postings() {
        let index = DocumentIndex::new();
        index.upsert_document(prepared("a.md", "shared only_a"));
        index.upsert_document(prepared("b.md", "shared"));
        let before = index.generation();

        assert!(index.remove_document(FileId::for_path("a.md")));
        assert_eq!(index.generation(), before + 1);
        assert!(index.lookup_exact("only_a").is_empty());
        assert_eq!(index.lookup_exact("shared").len(), 1);
        index.read().check_invariants().unwrap();
    }

    #[test]
    fn removing_unknown_file_keeps_generation() {
        let index = DocumentIndex::new();
        let before = index.generation();
        assert!(!index.remove_document(FileId::for_path("missing.md")));
        assert_eq!(index.generation(), before);
    }

    #[test]
    fn batch_bumps_generation_once() {
        let index = DocumentIndex::new();
        let generation = index.apply(IndexBatch {
            upserts: vec![
                prepared("a.md", "one"),
                prepared("b.md", "two"),
                prepared("c.md", "three"),
            ],
            removals: Vec::new(),
            mark_built: true,
        });
        assert_eq!(generation, 1);
        assert_eq!(index.len(), 3);
        assert!(index.read().last_built_at().is_some());
    }

    #[test]
    fn readers_between_chunks_see_whole_documents() {
        let index = Arc::new(DocumentIndex::new());
        let docs: Vec<PreparedDocument> = (0..COMMIT_CHUNK * 4)
            .map(|i| prepared(&format!("d{i:03}.md"), "shared words here"))
            .collect();

        let reader = {
            let index = Arc::clone(&index);
            std::thread::spawn(move || {
                loop {
                    let state = index.read();
                    state.check_invariants().unwrap();
                    if state.generation() == 1 {
                        assert_eq!(state.len(), COMMIT_CHUNK * 4);
                        break;
                    }
                    assert_eq!(state.generation(), 0);
                }
            })
        };

        let generation = index.apply(IndexBatch {
            upserts: docs,
            removals: Vec::new(),
            mark_built: true,
        });
        reader.join().unwrap();
        assert_eq!(generation, 1);
        assert_eq!(index.lookup_exact("shared").len(), COMMIT_CHUNK * 4);
    }

    #[test]
    fn vocabulary_is_sorted_and_distinct() {
        let index = DocumentIndex::new();
        index.upsert_document(prepared("a.md", "zeta alpha zeta"));
        index.upsert_document(prepared("b.md", "alpha mid"));
        assert_eq!(index.vocabulary(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn path_lookup_follows_upserts_and_removals() {
        let index = DocumentIndex::new();
        index.upsert_document(prepared("docs/a.md", "text"));
        let id = index.read().file_id_for_path("docs/a.md");
        assert_eq!(id, Some(FileId::for_path("docs/a.md")));

        index.remove_document(FileId::for_path("docs/a.md"));
        assert_eq!(index.read().file_id_for_path("docs/a.md"), None);
    }
}
