use std::collections::HashMap;

use tracing::debug;

use crate::{
    file_id::FileId,
    fuzzy::{self, NameMatch},
    index::{IndexState, IndexedDocument},
    query::{MatchKind, Query, ScoredResult},
    text_util::{DEFAULT_SNIPPET_CHARS, extract_snippet, line_number_at},
    tokenizer::{Tokenizer, normalize},
};

/// Weight of one exact occurrence of a query token.
const EXACT_WEIGHT: f64 = 1.0;

/// Multiplier applied to a filename similarity before it is added to the
/// content score.
pub const FILENAME_BONUS: f64 = 10.0;

/// Scale of the multiplicative reward for matching more distinct query
/// tokens: a file covering every token scores `1 + COVERAGE_BONUS` times
/// its raw content score.
pub const COVERAGE_BONUS: f64 = 1.0;

/// Default per-query cap on the number of files scored.
pub const DEFAULT_MAX_SCORED_FILES: usize = 5000;

/// Default number of distinct query tokens eligible for fuzzy expansion.
pub const DEFAULT_MAX_FUZZY_TOKENS: usize = 16;

/// Bounds on the work a single query may do.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_fuzzy_candidates: usize,
    /// Only the first this-many distinct query tokens scan the vocabulary.
    pub max_fuzzy_tokens: usize,
    pub max_scored_files: usize,
    pub snippet_chars: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_fuzzy_candidates: fuzzy::DEFAULT_MAX_CANDIDATES,
            max_fuzzy_tokens: DEFAULT_MAX_FUZZY_TOKENS,
            max_scored_files: DEFAULT_MAX_SCORED_FILES,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

/// Per-file score accumulator.
#[derive(Debug)]
struct Candidate {
    content: f64,
    /// First offset of each query token in this file, by token index.
    first_offsets: Vec<Option<usize>>,
    exact: bool,
    name: Option<NameMatch>,
}

impl Candidate {
    fn new(token_count: usize) -> Self {
        Self {
            content: 0.0,
            first_offsets: vec![None; token_count],
            exact: false,
            name: None,
        }
    }

    fn record(&mut self, token_idx: usize, weight: f64, positions: &[usize]) {
        self.content += weight * positions.len() as f64;
        if let Some(&first) = positions.first() {
            let slot = &mut self.first_offsets[token_idx];
            *slot = Some(slot.map_or(first, |seen| seen.min(first)));
        }
    }

    fn covered(&self) -> usize {
        self.first_offsets.iter().filter(|o| o.is_some()).count()
    }

    fn score(&self) -> f64 {
        let tokens = self.first_offsets.len();
        let coverage = if tokens == 0 {
            0.0
        } else {
            self.covered() as f64 / tokens as f64
        };
        let content = self.content * (1.0 + COVERAGE_BONUS * coverage);
        let name = self.name.map_or(0.0, |m| FILENAME_BONUS * m.similarity);
        content + name
    }

    fn match_kind(&self) -> MatchKind {
        if self.exact {
            MatchKind::Exact
        } else if self.name.is_some_and(|m| !m.kind.is_fuzzy()) {
            MatchKind::Filename
        } else {
            MatchKind::Fuzzy
        }
    }
}

/// Collects candidates while enforcing the filters and the work cap.
struct Scorer<'a> {
    state: &'a IndexState,
    query: &'a Query,
    token_count: usize,
    max_files: usize,
    candidates: HashMap<FileId, Candidate>,
    capped: bool,
}

impl<'a> Scorer<'a> {
    fn candidate(&mut self, id: FileId) -> Option<&mut Candidate> {
        if !self.candidates.contains_key(&id) {
            if self.candidates.len() >= self.max_files {
                self.capped = true;
                return None;
            }
            let doc = self.state.document(id)?;
            if !self.query.admits(&doc.meta.path, &doc.meta.extension) {
                return None;
            }
            self.candidates.insert(id, Candidate::new(self.token_count));
        }
        self.candidates.get_mut(&id)
    }
}

/// Run a validated query against a consistent index view.
///
/// Content matching looks every query token up exactly, and augments it
/// with fuzzy vocabulary candidates when the exact hits for that token are
/// fewer than the requested limit. Filename matching runs the query against
/// every file's base name. Results are sorted by score (descending), ties
/// broken by path, and truncated to the limit.
pub fn execute_search(
    state: &IndexState,
    query: &Query,
    tokenizer: &Tokenizer,
    limits: &SearchLimits,
) -> Vec<ScoredResult> {
    let mut tokens: Vec<String> = Vec::new();
    for token in tokenizer.tokenize(&query.text) {
        if !tokens.contains(&token.text) {
            tokens.push(token.text);
        }
    }

    let mut scorer = Scorer {
        state,
        query,
        token_count: tokens.len(),
        max_files: limits.max_scored_files,
        candidates: HashMap::new(),
        capped: false,
    };

    if query.search_type.includes_content() {
        score_content(&mut scorer, &tokens, limits);
    }
    if query.search_type.includes_filename() {
        score_filenames(&mut scorer);
    }

    if scorer.capped {
        debug!(
            max_scored_files = limits.max_scored_files,
            "query reached the scored-file cap"
        );
    }

    let mut ranked: Vec<(f64, &IndexedDocument, Candidate)> = scorer
        .candidates
        .into_iter()
        .filter_map(|(id, candidate)| {
            let score = candidate.score();
            let doc = state.document(id)?;
            (score > 0.0).then_some((score, doc.as_ref(), candidate))
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.0.total_cmp(&a.0).then_with(|| a.1.meta.path.cmp(&b.1.meta.path))
    });
    ranked.truncate(query.limit);

    ranked
        .into_iter()
        .map(|(score, doc, candidate)| {
            build_result(score, doc, &candidate, limits.snippet_chars)
        })
        .collect()
}

fn score_content(
    scorer: &mut Scorer<'_>,
    tokens: &[String],
    limits: &SearchLimits,
) {
    let state = scorer.state;
    let query = scorer.query;

    for (idx, token) in tokens.iter().enumerate() {
        // Files that passed the filters, not raw postings.
        let mut exact_hits = 0;
        if let Some(files) = state.postings(token) {
            for (id, positions) in files {
                if let Some(candidate) = scorer.candidate(*id) {
                    candidate.record(idx, EXACT_WEIGHT, positions);
                    candidate.exact = true;
                    exact_hits += 1;
                }
            }
        }

        if !query.fuzzy
            || exact_hits >= query.limit
            || idx >= limits.max_fuzzy_tokens
        {
            continue;
        }

        let expansions = fuzzy::fuzzy_candidates(
            token,
            state.vocabulary(),
            query.fuzzy_threshold,
            limits.max_fuzzy_candidates,
        );
        debug!(token, expansions = expansions.len(), "fuzzy expansion");

        for expansion in expansions {
            let Some(files) = state.postings(expansion.token) else {
                continue;
            };
            for (id, positions) in files {
                if let Some(candidate) = scorer.candidate(*id) {
                    candidate.record(idx, expansion.similarity, positions);
                }
            }
        }
    }
}

fn score_filenames(scorer: &mut Scorer<'_>) {
    let state = scorer.state;
    let query = scorer.query;
    let needle = normalize(&query.text);

    for doc in state.documents() {
        let base = doc.meta.path.rsplit('/').next().unwrap_or(&doc.meta.path);
        let Some(found) = fuzzy::match_name(
            &needle,
            base,
            query.fuzzy,
            query.fuzzy_threshold,
        ) else {
            continue;
        };
        if let Some(candidate) = scorer.candidate(doc.id) {
            candidate.name = Some(found);
        }
    }
}

fn build_result(
    score: f64,
    doc: &IndexedDocument,
    candidate: &Candidate,
    snippet_chars: usize,
) -> ScoredResult {
    let mut offsets: Vec<usize> =
        candidate.first_offsets.iter().flatten().copied().collect();
    offsets.sort_unstable();
    offsets.dedup();

    let anchor = offsets.first().copied();
    let snippet =
        extract_snippet(&doc.text, anchor.unwrap_or(0), snippet_chars);
    let line_number = anchor.map(|offset| line_number_at(&doc.text, offset));

    ScoredResult {
        file_id: doc.id,
        path: doc.meta.path.clone(),
        title: doc.meta.title.clone(),
        score,
        match_kind: candidate.match_kind(),
        snippet,
        line_number,
        matched_snippet_offsets: offsets,
        size_bytes: doc.meta.size_bytes,
        mtime: doc.meta.mtime,
    }
}

/// Print results for a terminal.
pub fn format_human(results: &[ScoredResult], took_ms: u64) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (rank, r) in results.iter().enumerate() {
        let location = r
            .line_number
            .map(|line| format!("{}:{line}", r.path))
            .unwrap_or_else(|| r.path.clone());
        println!(
            "{:>3}. [{:.3}] {location} ({}) {}",
            rank + 1,
            r.score,
            r.match_kind,
            r.file_id
        );
        if let Some(snippet) = &r.snippet {
            println!("     {snippet}");
        }
    }
    println!("\n{} result(s) in {took_ms} ms", results.len());
}
