//! Per-worker connections to one slug store.
//!
//! A worker checks a connection out, uses it alone, and hands it back when the
//! guard drops. Two workers never hold the same connection.

use crate::index::SlugStore;
use crate::{Result, SlugdexError};
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Pool of [`SlugStore`] connections bound to one database path.
pub struct ConnectionPool {
    db_path: PathBuf,
    idle: Mutex<Vec<SlugStore>>,
    max_idle: usize,
}

impl ConnectionPool {
    pub fn new(db_path: impl Into<PathBuf>, max_idle: usize) -> Self {
        Self {
            db_path: db_path.into(),
            idle: Mutex::new(Vec::new()),
            max_idle: max_idle.max(1),
        }
    }

    /// Seed the pool with an already opened connection.
    pub fn with_connection(self, store: SlugStore) -> Self {
        self.checkin(store);
        self
    }

    /// Check out a connection, opening a new one if none is idle.
    pub fn get(&self) -> Result<PooledStore<'_>> {
        let idle = self
            .idle
            .lock()
            .map_err(|_| SlugdexError::Database {
                message: "Failed to acquire connection pool lock".to_string(),
                source: None,
            })?
            .pop();

        let store = match idle {
            Some(store) => store,
            None => {
                debug!("Opening connection to {}", self.db_path.display());
                SlugStore::open(&self.db_path)?
            }
        };

        Ok(PooledStore {
            pool: self,
            store: Some(store),
        })
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    fn checkin(&self, store: SlugStore) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.max_idle {
                idle.push(store);
            }
        }
    }
}

/// A checked-out connection; returns to the pool on drop.
pub struct PooledStore<'a> {
    pool: &'a ConnectionPool,
    store: Option<SlugStore>,
}

impl Deref for PooledStore<'_> {
    type Target = SlugStore;

    fn deref(&self) -> &SlugStore {
        // Only `Drop` takes the store out.
        self.store.as_ref().expect("pooled store present until drop")
    }
}

impl Drop for PooledStore<'_> {
    fn drop(&mut self) {
        if let Some(store) = self.store.take() {
            self.pool.checkin(store);
        }
    }
}
