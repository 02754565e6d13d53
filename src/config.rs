use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    cache::DEFAULT_CACHE_CAPACITY,
    error::{Error, Result},
    search::SearchLimits,
    tokenizer::{DEFAULT_MAX_TOKEN_LEN, DEFAULT_MIN_TOKEN_LEN, Tokenizer},
    walker::WalkOptions,
};

/// Environment variable naming the documentation root.
pub const ROOT_ENV: &str = "DOCSIFT_ROOT";

/// Environment variable overriding the per-file size cap, in bytes.
pub const MAX_INDEX_BYTES_ENV: &str = "DOCSIFT_MAX_INDEX_BYTES";

/// Default period of the background refresher.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Everything a [`SearchEngine`](crate::engine::SearchEngine) needs to know.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Permitted root of the documentation tree.
    pub root: PathBuf,
    pub min_token_len: usize,
    pub max_token_len: usize,
    pub walk: WalkOptions,
    pub cache_capacity: usize,
    pub limits: SearchLimits,
    pub refresh_interval: Duration,
}

impl EngineConfig {
    /// Defaults for a given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            walk: WalkOptions::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            limits: SearchLimits::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Resolve the root from, in order of priority:
    /// 1. An explicit path (from --root)
    /// 2. The DOCSIFT_ROOT environment variable
    /// 3. The current directory
    ///
    /// Environment overrides are applied and the root must be an existing
    /// directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        Self::resolve_with(explicit, |key| std::env::var(key).ok())
    }

    fn resolve_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Some(val) = env(ROOT_ENV) {
            PathBuf::from(val)
        } else {
            std::env::current_dir()?
        };

        if !root.is_dir() {
            return Err(Error::Config(format!(
                "documentation root is not a directory: {}",
                root.display()
            )));
        }
        let root = root.canonicalize()?;

        let mut config = Self::new(root);
        config.apply_overrides(env)?;
        Ok(config)
    }

    /// Apply overrides read through `env`.
    pub fn apply_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(raw) = env(MAX_INDEX_BYTES_ENV) {
            let bytes = raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!(
                    "{MAX_INDEX_BYTES_ENV} must be a byte count, got {raw:?}"
                ))
            })?;
            if bytes == 0 {
                return Err(Error::Config(format!(
                    "{MAX_INDEX_BYTES_ENV} must be positive"
                )));
            }
            self.walk.max_file_bytes = bytes;
        }
        Ok(())
    }

    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::new(self.min_token_len, self.max_token_len)
    }
}
