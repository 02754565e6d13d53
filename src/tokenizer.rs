//! Text normalization and tokenization.
//!
//! Documents and queries go through the same pipeline so that a token
//! produced while indexing always equals the token produced for the same
//! word in a query:
//!
//! 1. Split on every character that is not a letter, digit, `_` or `-`.
//! 2. Trim leading and trailing `_`/`-` from each word.
//! 3. Decompose (NFD), drop combining marks, lowercase.
//! 4. Drop tokens outside the configured length bounds.
//!
//! Offsets are byte offsets into the *original* text and always land on a
//! character boundary, so they can be used to slice snippets.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Tokens shorter than this (in characters) are dropped by default.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 2;

/// Tokens longer than this (in characters) are always dropped.
pub const DEFAULT_MAX_TOKEN_LEN: usize = 64;

/// A normalized token and where it starts in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Byte offset of the token's first character in the original text.
    pub offset: usize,
}

/// Splits text into normalized tokens.
///
/// # Examples
///
/// ```
/// use docsift::tokenizer::Tokenizer;
///
/// let tokens: Vec<_> = Tokenizer::default()
///     .tokenize("Café file_handler, a x")
///     .map(|t| t.text)
///     .collect();
/// assert_eq!(tokens, vec!["cafe", "file_handler"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokenizer {
    min_len: usize,
    max_len: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_TOKEN_LEN,
            max_len: DEFAULT_MAX_TOKEN_LEN,
        }
    }
}

impl Tokenizer {
    /// Create a tokenizer with custom bounds.
    ///
    /// `min_len` is raised to 1 and `max_len` is capped at
    /// [`DEFAULT_MAX_TOKEN_LEN`].
    pub fn new(min_len: usize, max_len: usize) -> Self {
        let max_len = max_len.clamp(1, DEFAULT_MAX_TOKEN_LEN);
        let min_len = min_len.clamp(1, max_len);
        Self { min_len, max_len }
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Lazily tokenize `text`. The iterator is cheap to clone, so the
    /// sequence can be restarted.
    pub fn tokenize<'a>(&self, text: &'a str) -> Tokens<'a> {
        Tokens {
            text,
            pos: 0,
            tokenizer: *self,
        }
    }

    /// Whether a normalized token fits within the length bounds.
    pub fn accepts(&self, token: &str) -> bool {
        let len = token.chars().count();
        len >= self.min_len && len <= self.max_len
    }
}

/// Iterator returned by [`Tokenizer::tokenize`].
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
    tokenizer: Tokenizer,
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let rest = &self.text[self.pos..];
            let Some((skip, _)) =
                rest.char_indices().find(|(_, c)| is_word_char(*c))
            else {
                self.pos = self.text.len();
                return None;
            };

            let start = self.pos + skip;
            let end = self.text[start..]
                .char_indices()
                .find(|(_, c)| !is_word_char(*c))
                .map_or(self.text.len(), |(i, _)| start + i);
            self.pos = end;

            let raw = &self.text[start..end];
            let core = raw.trim_matches(is_connector);
            if core.is_empty() {
                continue;
            }
            let lead = raw.len() - raw.trim_start_matches(is_connector).len();

            let text = normalize_word(core);
            if text.is_empty() || !self.tokenizer.accepts(&text) {
                continue;
            }

            return Some(Token {
                text,
                offset: start + lead,
            });
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || is_connector(c) || is_combining_mark(c)
}

fn is_connector(c: char) -> bool {
    c == '_' || c == '-'
}

fn normalize_word(word: &str) -> String {
    word.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize free text: strip accents, lowercase, collapse whitespace.
///
/// Used for whole-query comparisons (filename matching, cache keys) where
/// the text is not split into tokens.
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split an identifier or file name into lowercase words.
///
/// Splits on any non-alphanumeric character and on camelCase boundaries,
/// keeping runs of capitals together (`HTTPSConnection` becomes
/// `https`, `connection`).
///
/// # Examples
///
/// ```
/// use docsift::tokenizer::split_words;
///
/// assert_eq!(split_words("fileHandler.py"), vec!["file", "handler", "py"]);
/// assert_eq!(split_words("HTTPSConnection"), vec!["https", "connection"]);
/// ```
pub fn split_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            flush_word(&mut current, &mut words);
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower =
                chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower)
            {
                flush_word(&mut current, &mut words);
            }
        }
        current.push(c);
    }
    flush_word(&mut current, &mut words);
    words
}

fn flush_word(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(normalize_word(current));
        current.clear();
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn texts(input: &str) -> Vec<String> {
        Tokenizer::default().tokenize(input).map(|t| t.text).collect()
    }

    #[test]
    fn lowercases_and_splits_on_punctuation() {
        assert_eq!(
            texts("Hello, World! foo.bar(baz)"),
            vec!["hello", "world", "foo", "bar", "baz"]
        );
    }

    #[test]
    fn keeps_underscores_and_hyphens_inside_words() {
        assert_eq!(
            texts("file_handler and read-only"),
            vec!["file_handler", "and", "read-only"]
        );
    }

    #[test]
    fn trims_surrounding_connectors() {
        let tokens: Vec<_> =
            Tokenizer::default().tokenize("  __init__ --").collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "init");
        assert_eq!(tokens[0].offset, 4);
    }

    #[test]
    fn strips_accents() {
        assert_eq!(texts("Résumé naïve"), vec!["resume", "naive"]);
    }

    #[test]
    fn decomposed_input_matches_composed() {
        let composed = texts("caf\u{e9}");
        let decomposed = texts("cafe\u{301}");
        assert_eq!(composed, decomposed);
    }

    #[test]
    fn drops_short_and_long_tokens() {
        let long = "a".repeat(65);
        let exact = "b".repeat(64);
        let input = format!("x {long} {exact} ok");
        assert_eq!(texts(&input), vec![exact, "ok".to_string()]);
    }

    #[test]
    fn custom_min_len() {
        let tokenizer = Tokenizer::new(1, 64);
        let tokens: Vec<_> =
            tokenizer.tokenize("a bc").map(|t| t.text).collect();
        assert_eq!(tokens, vec!["a", "bc"]);
    }

    #[test]
    fn new_clamps_bounds() {
        let tokenizer = Tokenizer::new(0, 500);
        assert_eq!(tokenizer.min_len(), 1);
        assert_eq!(tokenizer.max_len(), DEFAULT_MAX_TOKEN_LEN);

        let inverted = Tokenizer::new(10, 4);
        assert_eq!((inverted.min_len(), inverted.max_len()), (4, 4));
    }

    #[test]
    fn offsets_point_into_original_text() {
        let text = "Ünïcode :: ZqX1 here";
        for token in Tokenizer::default().tokenize(text) {
            assert!(text.is_char_boundary(token.offset));
        }
        let zq = Tokenizer::default()
            .tokenize(text)
            .find(|t| t.text == "zqx1")
            .unwrap();
        assert!(text[zq.offset..].starts_with("ZqX1"));
    }

    #[test]
    fn tokenize_is_restartable() {
        let tokens = Tokenizer::default().tokenize("one two three");
        let first: Vec<_> = tokens.clone().collect();
        let second: Vec<_> = tokens.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  Héllo \t  World "), "hello world");
    }

    #[test]
    fn split_words_variants() {
        assert_eq!(split_words("file_handler"), vec!["file", "handler"]);
        assert_eq!(
            split_words("getHTTPResponse"),
            vec!["get", "http", "response"]
        );
        assert_eq!(split_words("utf8Decoder"), vec!["utf8", "decoder"]);
        assert_eq!(split_words("README.md"), vec!["readme", "md"]);
        assert!(split_words("--").is_empty());
    }

    proptest! {
        #[test]
        fn tokens_respect_bounds(text in "\\PC{0,200}") {
            let tokenizer = Tokenizer::default();
            for token in tokenizer.tokenize(&text) {
                let len = token.text.chars().count();
                prop_assert!(len >= DEFAULT_MIN_TOKEN_LEN);
                prop_assert!(len <= DEFAULT_MAX_TOKEN_LEN);
                prop_assert!(text.is_char_boundary(token.offset));
            }
        }

        #[test]
        fn tokenizing_twice_is_deterministic(text in "\\PC{0,200}") {
            prop_assert_eq!(texts(&text), texts(&text));
        }

        #[test]
        fn query_tokens_match_document_tokens(word in "[a-zA-Z][a-zA-Z0-9_]{1,20}") {
            let doc = format!("before {word} after");
            let query = texts(&word);
            let indexed = texts(&doc);
            for token in query {
                prop_assert!(indexed.contains(&token));
            }
        }
    }
}
