//! Centralized configuration for slugdex.
//!
//! Constants for the store, the build pipeline and the source corpus layout,
//! plus [`IndexSettings`] which resolves the runtime locations from the
//! environment.

use std::path::PathBuf;
use std::time::Duration;

/// Persistent store and build pipeline configuration.
pub struct IndexConfig;

impl IndexConfig {
    pub const DEFAULT_DB_FILE: &'static str = "slugs.db";
    pub const BATCH_SIZE: usize = 10_000;
    pub const PROGRESS_LOG_INTERVAL: usize = 100_000;
    /// Character the corpus uses between words of a slug.
    pub const WORD_SEPARATOR: char = '_';
    pub const SLUG_TABLE: &'static str = "slugs";
    pub const FTS_TABLE: &'static str = "slug_fts";
    pub const FTS_TOKENIZER: &'static str = "porter unicode61";
    pub const CACHE_SIZE_PAGES: i64 = 10_000;
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
    pub const BUILDING_SUFFIX: &'static str = ".building";
    pub const LOCK_SUFFIX: &'static str = ".lock";
    /// Query issued by the warm-up routine; it is not expected to match.
    pub const WARM_QUERY: &'static str = "indexwarm";
}

/// Source corpus layout.
pub struct CorpusConfig;

impl CorpusConfig {
    pub const PARTITION_PREFIX: &'static str = "sitemap-";
    pub const NAMES_FILE: &'static str = "names.txt";
    pub const DATES_FILE: &'static str = "dates.txt";
}

/// Environment variable names.
pub struct EnvConfig;

impl EnvConfig {
    pub const DB_PATH: &'static str = "SLUG_DB_PATH";
    pub const LINKS_DIR: &'static str = "SLUG_LINKS_DIR";
}

/// Resolved runtime locations for a [`crate::SlugIndex`].
#[derive(Debug, Clone)]
pub struct IndexSettings {
    /// Where the SQLite store lives.
    pub db_path: PathBuf,
    /// Corpus to build from when the store is absent or empty.
    pub source_root: Option<PathBuf>,
    /// Idle connections kept by the pool.
    pub max_idle_connections: usize,
}

impl IndexSettings {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            source_root: None,
            max_idle_connections: default_pool_size(),
        }
    }

    pub fn with_source_root(mut self, source_root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(source_root.into());
        self
    }

    pub fn with_max_idle_connections(mut self, max: usize) -> Self {
        self.max_idle_connections = max.max(1);
        self
    }

    /// Resolve settings from `SLUG_DB_PATH` and `SLUG_LINKS_DIR`.
    ///
    /// Without `SLUG_DB_PATH` the store defaults to `slugs.db` in the working
    /// directory. Empty values count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = non_empty(EnvConfig::DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(IndexConfig::DEFAULT_DB_FILE));

        Self {
            db_path,
            source_root: non_empty(EnvConfig::LINKS_DIR).map(PathBuf::from),
            max_idle_connections: default_pool_size(),
        }
    }
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
