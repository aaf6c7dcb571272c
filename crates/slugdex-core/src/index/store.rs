//! SQLite slug store: schema and the indexed lookups behind every query.

use crate::config::IndexConfig;
use crate::{Result, SlugdexError};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

use super::fts5::{FTS5Config, FTS5Manager};
use super::normalize::{normalize_slug, slug_lower};
use super::query::{escape_like, prefix_upper_bound};

/// Drop and recreate the slug table, its indexes and the FTS5 table.
pub fn create_schema(conn: &Connection, fts5_config: &FTS5Config) -> Result<()> {
    let fts5 = FTS5Manager::new(fts5_config);
    fts5.drop_table(conn)?;

    conn.execute_batch(
        "
        DROP TABLE IF EXISTS slugs;

        CREATE TABLE slugs (
            id INTEGER PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            slug_lower TEXT NOT NULL,
            normalized TEXT NOT NULL,
            lastmod TEXT
        );

        CREATE INDEX idx_slug_lower ON slugs(slug_lower);
        CREATE INDEX idx_normalized ON slugs(normalized);
        ",
    )?;

    fts5.create_table(conn)?;
    Ok(())
}

/// Insert one slug, deriving its lowercase and normalized forms.
///
/// Returns false when the slug was already present; the first write wins.
pub fn insert_slug(conn: &Connection, slug: &str, lastmod: Option<&str>) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO slugs (slug, slug_lower, normalized, lastmod)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let inserted = stmt.execute(params![slug, slug_lower(slug), normalize_slug(slug), lastmod])?;
    Ok(inserted > 0)
}

/// One connection to a built slug store.
///
/// A `SlugStore` is used by one worker at a time; share the database through
/// [`crate::ConnectionPool`], not by sharing a store.
pub struct SlugStore {
    conn: Connection,
}

impl SlugStore {
    /// Open an existing store. Never creates the file.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if !db_path.exists() {
            return Err(SlugdexError::Database {
                message: format!("Slug store not found at {}", db_path.display()),
                source: None,
            });
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Self::configure_connection(&conn)?;

        Ok(Self { conn })
    }

    /// WAL keeps readers from blocking on each other or on a checkpoint.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.busy_timeout(IndexConfig::BUSY_TIMEOUT)?;
        conn.execute_batch(&format!(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size={};
            ",
            IndexConfig::CACHE_SIZE_PAGES
        ))?;
        Ok(())
    }

    /// Whether both the slug table and its full-text table exist.
    pub fn has_schema(&self) -> Result<bool> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [IndexConfig::SLUG_TABLE],
            |row| row.get(0),
        )?;
        if count == 0 {
            return Ok(false);
        }
        FTS5Manager::new(&FTS5Config::default()).table_exists(&self.conn)
    }

    /// Total number of slugs.
    pub fn count(&self) -> Result<usize> {
        let count: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM slugs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Case-insensitive equality against `slug_lower`.
    pub fn exact(&self, lower: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT slug FROM slugs WHERE slug_lower = ?1 LIMIT 1")?;
        let slug = stmt.query_row([lower], |row| row.get(0)).optional()?;
        Ok(slug)
    }

    /// Whether a slug exists, ignoring case.
    pub fn exists(&self, slug: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM slugs WHERE slug_lower = ?1 LIMIT 1")?;
        Ok(stmt.exists([slug_lower(slug)])?)
    }

    /// Slugs whose normalized form starts with `normalized`, shortest first.
    pub fn prefix_matches(&self, normalized: &str, limit: usize) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT slug FROM slugs
             WHERE normalized >= ?1 AND normalized < ?2
             ORDER BY LENGTH(slug), slug
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![normalized, prefix_upper_bound(normalized), limit as i64],
            |row| row.get(0),
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Slugs whose normalized form contains `normalized`.
    ///
    /// Prefix hits sort ahead of inner substring hits, then shorter slugs first.
    pub fn contains_matches(&self, normalized: &str, limit: usize) -> Result<Vec<String>> {
        let pattern = escape_like(normalized);
        let mut stmt = self.conn.prepare_cached(
            "SELECT slug FROM slugs
             WHERE normalized LIKE '%' || ?1 || '%' ESCAPE '\\'
             ORDER BY
                 CASE WHEN normalized LIKE ?1 || '%' ESCAPE '\\' THEN 0 ELSE 1 END,
                 LENGTH(slug),
                 slug
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Full-text matches for a prepared FTS5 query, best rank first.
    pub fn fulltext_matches(&self, fts_query: &str, limit: usize) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT s.slug FROM slug_fts f
             JOIN slugs s ON f.rowid = s.id
             WHERE slug_fts MATCH ?1
             ORDER BY rank, s.slug
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![fts_query, limit as i64], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Slugs starting with `prefix` (case-insensitive), in slug order.
    ///
    /// An empty prefix lists from the start of the corpus.
    pub fn list_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        if prefix.is_empty() {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT slug FROM slugs ORDER BY slug LIMIT ?1")?;
            let rows = stmt.query_map([limit as i64], |row| row.get(0))?;
            return Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?);
        }

        let lower = slug_lower(prefix);
        let mut stmt = self.conn.prepare_cached(
            "SELECT slug FROM slugs
             WHERE slug_lower >= ?1 AND slug_lower < ?2
             ORDER BY slug
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![lower, prefix_upper_bound(&lower), limit as i64],
            |row| row.get(0),
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Stored modification timestamp for a slug, ignoring case.
    pub fn lastmod(&self, slug: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT lastmod FROM slugs WHERE slug_lower = ?1 LIMIT 1")?;
        let lastmod: Option<Option<String>> = stmt
            .query_row([slug_lower(slug)], |row| row.get(0))
            .optional()?;
        Ok(lastmod.flatten())
    }

    /// Count of documents held by the full-text index.
    pub fn indexed_count(&self) -> Result<usize> {
        let config = FTS5Config::default();
        FTS5Manager::new(&config).indexed_count(&self.conn)
    }
}
