//! FTS5 virtual table setup and maintenance.
//!
//! The full-text table is an external-content table over the slug table's
//! `normalized` column, keyed by the slug table's rowid. It is never written
//! row by row; the builder fills it with a single `rebuild` command once all
//! slugs are loaded.

use crate::config::IndexConfig;
use crate::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Configuration for the FTS5 table.
#[derive(Debug, Clone)]
pub struct FTS5Config {
    /// Name of the FTS5 virtual table.
    pub table_name: String,
    /// Table whose `normalized` column is indexed.
    pub content_table: String,
    /// Tokenizer configuration.
    pub tokenizer: String,
}

impl Default for FTS5Config {
    fn default() -> Self {
        Self {
            table_name: IndexConfig::FTS_TABLE.to_string(),
            content_table: IndexConfig::SLUG_TABLE.to_string(),
            tokenizer: IndexConfig::FTS_TOKENIZER.to_string(),
        }
    }
}

/// Manager for FTS5 setup and maintenance.
pub struct FTS5Manager<'a> {
    config: &'a FTS5Config,
}

impl<'a> FTS5Manager<'a> {
    /// Create a new FTS5 manager.
    pub fn new(config: &'a FTS5Config) -> Self {
        Self { config }
    }

    /// Check if the FTS5 table exists.
    pub fn table_exists(&self, conn: &Connection) -> Result<bool> {
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [&self.config.table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Drop the FTS5 table if present.
    pub fn drop_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", self.config.table_name))?;
        Ok(())
    }

    /// Create the FTS5 virtual table.
    pub fn create_table(&self, conn: &Connection) -> Result<()> {
        let sql = format!(
            "CREATE VIRTUAL TABLE {} USING fts5(
                normalized,
                content='{}',
                content_rowid='id',
                tokenize='{}'
            )",
            self.config.table_name, self.config.content_table, self.config.tokenizer
        );

        conn.execute(&sql, [])?;
        info!("Created FTS5 table: {}", self.config.table_name);
        Ok(())
    }

    /// Re-index every row of the content table.
    pub fn rebuild(&self, conn: &Connection) -> Result<()> {
        let sql = format!(
            "INSERT INTO {}({}) VALUES('rebuild')",
            self.config.table_name, self.config.table_name
        );
        conn.execute(&sql, [])?;
        info!("Rebuilt FTS5 index {}", self.config.table_name);
        Ok(())
    }

    /// Merge index b-trees into one.
    pub fn optimize(&self, conn: &Connection) -> Result<()> {
        let sql = format!(
            "INSERT INTO {}({}) VALUES('optimize')",
            self.config.table_name, self.config.table_name
        );
        conn.execute(&sql, [])?;
        debug!("Optimized FTS5 index");
        Ok(())
    }

    /// Number of documents the full-text index actually holds.
    ///
    /// External-content tables answer `COUNT(*)` from the content table, so
    /// this reads the per-document size table FTS5 maintains instead.
    pub fn indexed_count(&self, conn: &Connection) -> Result<usize> {
        let count: usize = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}_docsize", self.config.table_name),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
