use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    file_id::{FileId, normalize_path},
    fuzzy::DEFAULT_FUZZY_THRESHOLD,
    tokenizer::normalize,
};

/// Default number of results returned by a search.
pub const DEFAULT_LIMIT: usize = 50;

/// Largest accepted result limit.
pub const MAX_LIMIT: usize = 200;

/// Longest accepted query text, in characters.
pub const MAX_QUERY_CHARS: usize = 1000;

/// Which parts of a file a query is matched against.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Content,
    Filename,
    #[default]
    Both,
}

impl SearchType {
    pub fn includes_content(self) -> bool {
        matches!(self, Self::Content | Self::Both)
    }

    pub fn includes_filename(self) -> bool {
        matches!(self, Self::Filename | Self::Both)
    }
}

impl std::str::FromStr for SearchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "filename" => Ok(Self::Filename),
            "both" => Ok(Self::Both),
            other => Err(Error::invalid_query(format!(
                "unknown search type {other:?} (expected content, filename or both)"
            ))),
        }
    }
}

/// How a result was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    Filename,
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Filename => "filename",
        })
    }
}

/// A search request.
///
/// # Examples
///
/// ```
/// use docsift::query::{Query, SearchType};
///
/// let query = Query::new("config loader")
///     .search_type(SearchType::Content)
///     .extensions(["md", ".TXT"])
///     .limit(10);
/// assert!(query.validate().is_ok());
/// assert!(Query::new("  ").validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub text: String,
    pub search_type: SearchType,
    /// Allowed extensions; empty means every extension.
    pub extensions: BTreeSet<String>,
    /// Restrict results to files below this relative directory.
    pub path_prefix: Option<String>,
    pub limit: usize,
    pub fuzzy: bool,
    pub fuzzy_threshold: f64,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            search_type: SearchType::default(),
            extensions: BTreeSet::new(),
            path_prefix: None,
            limit: DEFAULT_LIMIT,
            fuzzy: true,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }

    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    /// Set the extension filter. Entries may carry a leading dot or be
    /// comma-separated lists; they are lowercased.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .flat_map(|e| {
                e.as_ref()
                    .split(',')
                    .map(normalize_extension)
                    .collect::<Vec<_>>()
            })
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn path_prefix(mut self, prefix: Option<impl Into<String>>) -> Self {
        self.path_prefix = prefix
            .map(|p| normalize_path(&p.into()))
            .filter(|p| !p.is_empty());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    /// Check the request before any work is done.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::invalid_query("query text is empty"));
        }
        if self.text.chars().count() > MAX_QUERY_CHARS {
            return Err(Error::invalid_query(format!(
                "query text exceeds {MAX_QUERY_CHARS} characters"
            )));
        }
        if self.text.contains('\0') {
            return Err(Error::invalid_query("query text contains a NUL byte"));
        }
        if self.limit == 0 {
            return Err(Error::invalid_query("limit must be positive"));
        }
        if self.limit > MAX_LIMIT {
            return Err(Error::invalid_query(format!(
                "limit must be at most {MAX_LIMIT}"
            )));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(Error::invalid_query(
                "fuzzy threshold must be between 0 and 1",
            ));
        }
        if let Some(prefix) = &self.path_prefix
            && prefix.split('/').any(|segment| segment == "..")
        {
            return Err(Error::invalid_query(
                "path filter must stay inside the indexed root",
            ));
        }
        Ok(())
    }

    /// The normalized tuple identifying this query in the cache.
    pub fn key(&self) -> QueryKey {
        QueryKey {
            text: normalize(&self.text),
            search_type: self.search_type,
            extensions: self.extensions.iter().cloned().collect(),
            path_prefix: self.path_prefix.clone(),
            limit: self.limit,
            fuzzy: self.fuzzy,
            threshold_bits: self.fuzzy_threshold.to_bits(),
        }
    }

    /// Whether a file passes the extension and path filters.
    pub fn admits(&self, path: &str, extension: &str) -> bool {
        if !self.extensions.is_empty() && !self.extensions.contains(extension)
        {
            return false;
        }
        match &self.path_prefix {
            Some(prefix) => {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            None => true,
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Cache key: the normalized query tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    text: String,
    search_type: SearchType,
    extensions: Vec<String>,
    path_prefix: Option<String>,
    limit: usize,
    fuzzy: bool,
    threshold_bits: u64,
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    pub file_id: FileId,
    pub path: String,
    pub title: String,
    pub score: f64,
    pub match_kind: MatchKind,
    pub snippet: Option<String>,
    /// 1-indexed line of the first matched token, when there is one.
    pub line_number: Option<usize>,
    /// Byte offsets of the first occurrence of each matched query token.
    pub matched_snippet_offsets: Vec<usize>,
    pub size_bytes: u64,
    pub mtime: u64,
}
