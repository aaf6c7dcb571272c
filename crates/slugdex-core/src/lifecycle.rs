//! Lazily initialized slug index shared by all query callers.
//!
//! The first call that needs the store opens it, or builds it from the source
//! corpus when it is absent or empty. Initialization runs under a mutex so
//! concurrent first callers trigger at most one build. Until a usable store
//! exists every query answers with an empty result.

use crate::config::{IndexConfig, IndexSettings};
use crate::index::{self, IndexBuilder, NormalizedQuery, SlugStore};
use crate::pool::ConnectionPool;
use crate::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, error, info, warn};

/// Readiness of a [`SlugIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum IndexStatus {
    Uninitialized,
    #[serde(rename_all = "camelCase")]
    Ready { record_count: usize },
}

/// Handle to a ready store; owns the connection pool.
pub struct IndexHandle {
    pool: ConnectionPool,
}

impl IndexHandle {
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

#[derive(Default)]
struct InitState {
    build_failed: bool,
    reported_unavailable: bool,
}

/// Slug resolution index with lazy open-or-build.
///
/// Construct one at startup and pass it to request handlers; it is `Sync` and
/// meant to be shared behind an `Arc`.
pub struct SlugIndex {
    settings: IndexSettings,
    builder: IndexBuilder,
    handle: OnceLock<IndexHandle>,
    init: Mutex<InitState>,
    builds: AtomicUsize,
}

impl SlugIndex {
    pub fn new(settings: IndexSettings) -> Self {
        Self::with_builder(settings, IndexBuilder::default())
    }

    /// Use a custom builder for on-demand builds.
    pub fn with_builder(settings: IndexSettings, builder: IndexBuilder) -> Self {
        info!("Using SQLite slug database: {}", settings.db_path.display());
        Self {
            settings,
            builder,
            handle: OnceLock::new(),
            init: Mutex::new(InitState::default()),
            builds: AtomicUsize::new(0),
        }
    }

    /// Settings resolved from `SLUG_DB_PATH` / `SLUG_LINKS_DIR`.
    pub fn from_env() -> Self {
        Self::new(IndexSettings::from_env())
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Builds this index has started (successful or not).
    pub fn builds_performed(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Open the store, building it first if needed.
    ///
    /// Returns `None` while no usable store exists and none can be built.
    pub fn ensure_ready(&self) -> Option<&IndexHandle> {
        if let Some(handle) = self.handle.get() {
            return Some(handle);
        }

        let mut state = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = self.handle.get() {
            return Some(handle);
        }

        if let Some(store) = self.open_existing() {
            return Some(self.install(store));
        }

        if state.build_failed {
            return None;
        }

        let Some(source_root) = self
            .settings
            .source_root
            .as_deref()
            .filter(|root| root.is_dir())
        else {
            if !state.reported_unavailable {
                warn!("No slug index available - source corpus not found");
                state.reported_unavailable = true;
            }
            return None;
        };

        info!("Building SQLite slug index from {}", source_root.display());
        self.builds.fetch_add(1, Ordering::SeqCst);
        let built = self
            .builder
            .build_if_absent(source_root, &self.settings.db_path)
            .and_then(|_| SlugStore::open(&self.settings.db_path));

        match built {
            Ok(store) => Some(self.install(store)),
            Err(e) => {
                error!("Failed to build slug index: {}", e);
                state.build_failed = true;
                None
            }
        }
    }

    /// An existing store with at least one slug, if there is one.
    fn open_existing(&self) -> Option<SlugStore> {
        let db_path = &self.settings.db_path;
        if !db_path.exists() {
            return None;
        }

        let checked = SlugStore::open(db_path).and_then(|store| {
            let count = if store.has_schema()? { store.count()? } else { 0 };
            Ok((store, count))
        });

        match checked {
            Ok((store, count)) if count > 0 => {
                info!("SQLite slug index ready with {} articles", count);
                Some(store)
            }
            Ok(_) => {
                debug!("Slug store at {} is empty", db_path.display());
                None
            }
            Err(e) => {
                debug!("Slug store at {} is unusable: {}", db_path.display(), e);
                None
            }
        }
    }

    fn install(&self, store: SlugStore) -> &IndexHandle {
        let pool = ConnectionPool::new(&self.settings.db_path, self.settings.max_idle_connections)
            .with_connection(store);
        self.handle.get_or_init(|| IndexHandle { pool })
    }

    /// Run `op` on a pooled connection; `None` if not ready or on error.
    fn with_store<T>(&self, what: &str, op: impl FnOnce(&SlugStore) -> Result<T>) -> Option<T> {
        let handle = self.ensure_ready()?;
        let result = handle.pool().get().and_then(|store| op(&*store));
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Slug index {} failed: {}", what, e);
                None
            }
        }
    }

    /// Resolve a query to at most `limit` candidate slugs.
    ///
    /// Runs exact, prefix, contains and (when `fuzzy`) full-text matching in
    /// that order. Blank queries return nothing without touching the store.
    pub fn search(&self, query: &str, limit: usize, fuzzy: bool) -> Vec<String> {
        let Some(query) = NormalizedQuery::parse(query) else {
            return Vec::new();
        };
        if limit == 0 {
            return Vec::new();
        }
        self.with_store("search", |store| {
            Ok(index::search(store, &query, limit, fuzzy))
        })
        .unwrap_or_default()
    }

    /// Whether `slug` is indexed, ignoring case.
    pub fn exists(&self, slug: &str) -> bool {
        self.with_store("exists", |store| store.exists(slug))
            .unwrap_or(false)
    }

    /// The single best candidate for `query`.
    ///
    /// `min_similarity` is accepted for callers that pass one but is not
    /// applied; the result is the first hit of a fuzzy [`search`](Self::search).
    pub fn best_match(&self, query: &str, _min_similarity: f64) -> Option<String> {
        self.search(query, 1, true).into_iter().next()
    }

    /// Slugs starting with `prefix` (case-insensitive), sorted by slug.
    pub fn list_by_prefix(&self, prefix: &str, limit: usize) -> Vec<String> {
        self.with_store("list_by_prefix", |store| store.list_by_prefix(prefix, limit))
            .unwrap_or_default()
    }

    /// Number of indexed slugs; 0 while uninitialized.
    pub fn total_count(&self) -> usize {
        self.with_store("total_count", |store| store.count())
            .unwrap_or(0)
    }

    /// Last modification timestamp recorded for `slug`.
    pub fn lastmod(&self, slug: &str) -> Option<String> {
        self.with_store("lastmod", |store| store.lastmod(slug))
            .flatten()
    }

    pub fn status(&self) -> IndexStatus {
        match self.handle.get() {
            Some(_) => IndexStatus::Ready {
                record_count: self.total_count(),
            },
            None => IndexStatus::Uninitialized,
        }
    }

    /// Touch the store so the first real caller does not pay for init.
    ///
    /// Idempotent; failures are logged and reported as `false`.
    pub fn warm(&self) -> bool {
        if self.ensure_ready().is_none() {
            warn!("Failed to warm slug index: index unavailable");
            return false;
        }
        let count = self.total_count();
        self.search(IndexConfig::WARM_QUERY, 1, false);
        debug!("Warmed slug index ({} articles)", count);
        true
    }
}
