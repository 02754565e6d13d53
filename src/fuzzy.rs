//! Approximate matching of query tokens against the index vocabulary and
//! of whole queries against file names.
//!
//! Similarity is `1 - distance / max(len_a, len_b)` over Unicode scalar
//! values, so it always lies in `[0, 1]` and equals `1.0` only for equal
//! strings. Acronyms (`fh` for `file_handler`) get a fixed similarity of
//! [`ACRONYM_SIMILARITY`].

use crate::tokenizer::split_words;

/// Default minimum similarity for a fuzzy match.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.7;

/// Default cap on fuzzy candidates considered per query token.
pub const DEFAULT_MAX_CANDIDATES: usize = 50;

/// Similarity assigned when the query spells the initials of consecutive
/// words in a candidate.
pub const ACRONYM_SIMILARITY: f64 = 0.8;

const SUBSTRING_SIMILARITY: f64 = 0.9;
const SUBSTRING_POSITION_BONUS: f64 = 0.05;
const WORDS_SIMILARITY: f64 = 0.85;
const WORD_AVERAGE_FACTOR: f64 = 0.9;

/// Tolerance for threshold comparisons on computed ratios.
const EPSILON: f64 = 1e-9;

/// Levenshtein distance between two strings, counted in characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    distance(&a, &b)
}

fn distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ac) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, bc) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ac != bc);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Distance between `a` and `b` if it is at most `max`, without finishing
/// the full table when the answer is already known to exceed `max`.
fn distance_within(a: &[char], b: &[char], max: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        let d = a.len().max(b.len());
        return (d <= max).then_some(d);
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ac) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        let mut row_min = row[0];
        for (j, bc) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ac != bc);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
            row_min = row_min.min(row[j + 1]);
        }
        if row_min > max {
            return None;
        }
    }
    let d = row[b.len()];
    (d <= max).then_some(d)
}

/// Edit-distance similarity in `[0, 1]`.
///
/// # Examples
///
/// ```
/// use docsift::fuzzy::similarity;
///
/// assert_eq!(similarity("same", "same"), 1.0);
/// assert!((similarity("flie_hander", "file_handler") - 0.75).abs() < 1e-9);
/// ```
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio(&a, &b)
}

fn ratio(a: &[char], b: &[char]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - distance(a, b) as f64 / longest as f64
}

/// Whether `query` spells the initials of a run of consecutive `words`.
///
/// Requires at least two words so that a plain prefix never counts as an
/// acronym.
pub fn is_acronym(query: &str, words: &[String]) -> bool {
    let initials: Vec<char> = query.chars().collect();
    if initials.len() < 2 || initials.len() > words.len() {
        return false;
    }
    if initials.iter().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    words.windows(initials.len()).any(|window| {
        window
            .iter()
            .zip(&initials)
            .all(|(word, initial)| word.chars().next() == Some(*initial))
    })
}

/// A vocabulary token close enough to a query token.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyCandidate<'a> {
    pub token: &'a str,
    pub similarity: f64,
}

/// Vocabulary tokens similar to `query` at or above `threshold`.
///
/// The exact token itself is never returned. Results are ordered by
/// similarity (descending) then token, and capped at `max_candidates`.
pub fn fuzzy_candidates<'a>(
    query: &str,
    vocabulary: impl IntoIterator<Item = &'a str>,
    threshold: f64,
    max_candidates: usize,
) -> Vec<FuzzyCandidate<'a>> {
    let query_chars: Vec<char> = query.chars().collect();
    if query_chars.is_empty() || max_candidates == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<FuzzyCandidate<'a>> = vocabulary
        .into_iter()
        .filter(|token| *token != query)
        .filter_map(|token| {
            let similarity =
                token_similarity(&query_chars, query, token, threshold)?;
            Some(FuzzyCandidate { token, similarity })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.token.cmp(b.token))
    });
    candidates.truncate(max_candidates);
    candidates
}

fn token_similarity(
    query_chars: &[char],
    query: &str,
    candidate: &str,
    threshold: f64,
) -> Option<f64> {
    let candidate_chars: Vec<char> = candidate.chars().collect();
    let longest = query_chars.len().max(candidate_chars.len());
    let max_edits = ((1.0 - threshold) * longest as f64 + EPSILON).floor();
    let max_edits = if max_edits < 0.0 { 0 } else { max_edits as usize };

    let edit_similarity =
        distance_within(query_chars, &candidate_chars, max_edits)
            .map(|d| 1.0 - d as f64 / longest as f64)
            .filter(|s| *s + EPSILON >= threshold);

    let acronym = (candidate.contains(['_', '-'])
        && ACRONYM_SIMILARITY + EPSILON >= threshold
        && is_acronym(query, &split_words(candidate)))
    .then_some(ACRONYM_SIMILARITY);

    match (edit_similarity, acronym) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Which rung of the name-matching ladder produced a [`NameMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatchKind {
    Exact,
    Substring,
    Words,
    Acronym,
    Fuzzy,
}

impl NameMatchKind {
    pub fn is_fuzzy(self) -> bool {
        self == Self::Fuzzy
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameMatch {
    pub similarity: f64,
    pub kind: NameMatchKind,
}

/// Match a normalized query against a file name.
///
/// Tries, in order: exact name or stem, substring, every query word inside
/// some name word, acronym of consecutive name words, and finally (only
/// when `allow_fuzzy`) edit-distance similarity against the stem or the
/// averaged best word pairs.
pub fn match_name(
    query: &str,
    file_name: &str,
    allow_fuzzy: bool,
    threshold: f64,
) -> Option<NameMatch> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let name = crate::tokenizer::normalize(file_name);
    let stem = name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem);

    if query == name || query == stem {
        return Some(NameMatch {
            similarity: 1.0,
            kind: NameMatchKind::Exact,
        });
    }

    if let Some(pos) = name.find(query) {
        let position_bonus = 1.0 - pos as f64 / name.len() as f64;
        return Some(NameMatch {
            similarity: SUBSTRING_SIMILARITY
                + SUBSTRING_POSITION_BONUS * position_bonus,
            kind: NameMatchKind::Substring,
        });
    }

    let query_words = split_words(query);
    let name_words = split_words(file_name);
    if !query_words.is_empty()
        && query_words
            .iter()
            .all(|qw| name_words.iter().any(|nw| nw.contains(qw.as_str())))
    {
        return Some(NameMatch {
            similarity: WORDS_SIMILARITY,
            kind: NameMatchKind::Words,
        });
    }

    if is_acronym(query, &name_words) {
        return Some(NameMatch {
            similarity: ACRONYM_SIMILARITY,
            kind: NameMatchKind::Acronym,
        });
    }

    if !allow_fuzzy {
        return None;
    }

    let whole = similarity(query, stem);
    let words = word_average(&query_words, &name_words) * WORD_AVERAGE_FACTOR;
    let best = whole.max(words);
    (best + EPSILON >= threshold).then_some(NameMatch {
        similarity: best,
        kind: NameMatchKind::Fuzzy,
    })
}

fn word_average(query_words: &[String], name_words: &[String]) -> f64 {
    if query_words.is_empty() || name_words.is_empty() {
        return 0.0;
    }
    let total: f64 = query_words
        .iter()
        .map(|qw| {
            name_words
                .iter()
                .map(|nw| similarity(qw, nw))
                .fold(0.0, f64::max)
        })
        .sum();
    total / query_words.len() as f64
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flie_hander", "file_handler"), 3);
    }

    #[test]
    fn levenshtein_counts_characters_not_bytes() {
        assert_eq!(levenshtein("café", "cafe"), 1);
    }

    #[test]
    fn bounded_distance_agrees_with_full_distance() {
        let a: Vec<char> = "kitten".chars().collect();
        let b: Vec<char> = "sitting".chars().collect();
        assert_eq!(distance_within(&a, &b, 3), Some(3));
        assert_eq!(distance_within(&a, &b, 2), None);
    }

    #[test]
    fn acronym_matches_consecutive_initials() {
        assert!(is_acronym("fh", &words(&["file", "handler"])));
        assert!(is_acronym("fh", &words(&["my", "file", "handler"])));
        assert!(!is_acronym("mh", &words(&["my", "file", "handler"])));
        assert!(!is_acronym("f", &words(&["file", "handler"])));
        assert!(!is_acronym("fhx", &words(&["file", "handler"])));
    }

    #[test]
    fn candidates_exclude_the_exact_token() {
        let vocab = ["handler", "handle", "handler"];
        let found = fuzzy_candidates("handler", vocab, 0.7, 50);
        assert!(found.iter().all(|c| c.token != "handler"));
        assert!(found.iter().any(|c| c.token == "handle"));
    }

    #[test]
    fn candidates_are_sorted_and_capped() {
        let vocab = ["handlr", "handle", "hander", "xyz", "candler"];
        let found = fuzzy_candidates("handler", vocab, 0.7, 2);
        assert_eq!(found.len(), 2);
        assert!(found[0].similarity >= found[1].similarity);
        assert!(found.iter().all(|c| c.token != "xyz"));
    }

    #[test]
    fn candidates_respect_threshold() {
        let vocab = ["handler", "xandlex"];
        assert!(fuzzy_candidates("handles", vocab, 0.9, 50).is_empty());
        assert_eq!(fuzzy_candidates("handles", vocab, 0.8, 50).len(), 1);
    }

    #[test]
    fn candidates_include_acronyms() {
        let vocab = ["file_handler", "fetch"];
        let found = fuzzy_candidates("fh", vocab, 0.7, 50);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].token, "file_handler");
        assert_eq!(found[0].similarity, ACRONYM_SIMILARITY);
    }

    #[test]
    fn name_exact_and_stem() {
        let m = match_name("readme.md", "README.md", true, 0.7).unwrap();
        assert_eq!(m.kind, NameMatchKind::Exact);
        let m = match_name("readme", "README.md", true, 0.7).unwrap();
        assert_eq!(m.kind, NameMatchKind::Exact);
    }

    #[test]
    fn name_substring_prefers_early_position() {
        let early = match_name("config", "config_loader.rs", true, 0.7).unwrap();
        let late = match_name("config", "load_config.rs", true, 0.7).unwrap();
        assert_eq!(early.kind, NameMatchKind::Substring);
        assert!(early.similarity > late.similarity);
    }

    #[test]
    fn name_words_in_any_order() {
        let m = match_name("handler file", "file_handler.py", true, 0.7).unwrap();
        assert_eq!(m.kind, NameMatchKind::Words);
    }

    #[test]
    fn name_acronym_with_camel_case() {
        let m = match_name("fh", "FileHandler.java", false, 0.7).unwrap();
        assert_eq!(m.kind, NameMatchKind::Acronym);
        assert_eq!(m.similarity, ACRONYM_SIMILARITY);
    }

    #[test]
    fn name_typo_is_fuzzy() {
        let m = match_name("flie_hander", "file_handler.py", true, 0.6).unwrap();
        assert_eq!(m.kind, NameMatchKind::Fuzzy);
        assert!((m.similarity - 0.75).abs() < 1e-9);
    }

    #[test]
    fn name_typo_needs_fuzzy_enabled() {
        assert!(match_name("flie_hander", "file_handler.py", false, 0.6).is_none());
    }

    #[test]
    fn name_unrelated_is_none() {
        assert!(match_name("zebra", "file_handler.py", true, 0.7).is_none());
    }

    proptest! {
        #[test]
        fn similarity_is_symmetric(a in "[a-z_]{0,12}", b in "[a-z_]{0,12}") {
            prop_assert_eq!(similarity(&a, &b), similarity(&b, &a));
        }

        #[test]
        fn similarity_is_bounded(a in "\\PC{0,12}", b in "\\PC{0,12}") {
            let s = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn identity_is_one(a in "\\PC{0,16}") {
            prop_assert_eq!(similarity(&a, &a), 1.0);
            prop_assert_eq!(levenshtein(&a, &a), 0);
        }

        #[test]
        fn bounded_matches_full(a in "[a-d]{0,8}", b in "[a-d]{0,8}", max in 0usize..10) {
            let ac: Vec<char> = a.chars().collect();
            let bc: Vec<char> = b.chars().collect();
            let full = distance(&ac, &bc);
            let bounded = distance_within(&ac, &bc, max);
            if full <= max {
                prop_assert_eq!(bounded, Some(full));
            } else {
                prop_assert_eq!(bounded, None);
            }
        }
    }
}
