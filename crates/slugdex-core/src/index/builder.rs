//! One-shot batch build of the slug store from a corpus.
//!
//! The build writes a complete store into a sibling `<dest>.building` file and
//! renames it onto `dest` only after the FTS5 rebuild succeeded, so a reader
//! opening `dest` sees either the previous snapshot or the finished one.

use crate::config::IndexConfig;
use crate::corpus::{Corpus, CorpusLayout, SlugEntry};
use crate::{Result, SlugdexError};
use fs2::FileExt;
use rusqlite::Connection;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::fts5::{FTS5Config, FTS5Manager};
use super::store::{create_schema, insert_slug, SlugStore};

/// Outcome of a successful build.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    /// Distinct slugs in the published store.
    pub record_count: usize,
    pub partitions_read: usize,
    pub partitions_skipped: usize,
    pub duration_ms: u64,
    pub db_size_bytes: u64,
    /// Another builder published a populated store while this one waited.
    pub reused_existing: bool,
}

/// Builder for the slug store.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    layout: CorpusLayout,
    batch_size: usize,
    compact: bool,
    fts5_config: FTS5Config,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self {
            layout: CorpusLayout::default(),
            batch_size: IndexConfig::BATCH_SIZE,
            compact: true,
            fts5_config: FTS5Config::default(),
        }
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corpus layout to read partitions with.
    pub fn with_layout(mut self, layout: CorpusLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Rows per insert transaction.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// FTS5 table name and tokenizer.
    pub fn with_fts5_config(mut self, fts5_config: FTS5Config) -> Self {
        self.fts5_config = fts5_config;
        self
    }

    /// Run FTS5 optimize, `VACUUM` and `ANALYZE` before publishing.
    ///
    /// Default: `true`
    pub fn compact(mut self, enable: bool) -> Self {
        self.compact = enable;
        self
    }

    /// Build a fresh store at `dest` from the corpus at `source_root`.
    ///
    /// Destructive: whatever was at `dest` is replaced. Unreadable partitions
    /// are skipped; any schema, insert or FTS5 failure aborts the build and
    /// leaves `dest` untouched.
    pub fn build(&self, source_root: &Path, dest: &Path) -> Result<BuildReport> {
        self.run(source_root, dest, false)
    }

    /// Build only if `dest` holds no populated store once the build lock is
    /// held.
    ///
    /// Used by on-demand builds: when an operator build finishes while this
    /// one waits on the lock, its store is kept instead of being rebuilt.
    pub fn build_if_absent(&self, source_root: &Path, dest: &Path) -> Result<BuildReport> {
        self.run(source_root, dest, true)
    }

    fn run(&self, source_root: &Path, dest: &Path, keep_populated: bool) -> Result<BuildReport> {
        let start = Instant::now();
        let corpus = Corpus::open(source_root, self.layout.clone())?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SlugdexError::io_with_path(e, parent))?;
        }

        let _lock = BuildLock::acquire(dest)?;

        if keep_populated {
            if let Some(record_count) = populated_count(dest) {
                info!(
                    "Slug store at {} already holds {} slugs, skipping build",
                    dest.display(),
                    record_count
                );
                return Ok(BuildReport {
                    record_count,
                    partitions_read: 0,
                    partitions_skipped: 0,
                    duration_ms: start.elapsed().as_millis() as u64,
                    db_size_bytes: fs::metadata(dest).map(|m| m.len()).unwrap_or(0),
                    reused_existing: true,
                });
            }
        }

        info!("Building slug database: {}", dest.display());
        info!("Reading from: {}", source_root.display());

        let staging = StagingFile::create(dest)?;
        let conn = Connection::open(staging.path())?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=DELETE;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )?;

        create_schema(&conn, &self.fts5_config).map_err(|e| SlugdexError::Schema {
            message: format!("Failed to create schema: {}", e),
        })?;

        let mut entries = corpus.entries()?;
        let mut batch: Vec<SlugEntry> = Vec::with_capacity(self.batch_size);
        let mut seen_entries = 0usize;
        let mut loaded = 0usize;

        for entry in entries.by_ref() {
            batch.push(entry);
            if batch.len() >= self.batch_size {
                loaded += insert_batch(&conn, &batch)?;
                seen_entries += batch.len();
                batch.clear();
                if seen_entries % IndexConfig::PROGRESS_LOG_INTERVAL == 0 {
                    info!("Loaded {} slugs...", loaded);
                }
            }
        }
        if !batch.is_empty() {
            loaded += insert_batch(&conn, &batch)?;
        }

        let partitions_read = entries.partitions_read();
        let partitions_skipped = entries.partitions_skipped();
        if partitions_skipped > 0 {
            warn!("Skipped {} unreadable partitions", partitions_skipped);
        }

        info!("Building full-text search index...");
        let record_count = self.finish_fts(&conn)?;
        debug_assert_eq!(record_count, loaded);

        if self.compact {
            info!("Optimizing database...");
            FTS5Manager::new(&self.fts5_config).optimize(&conn)?;
            conn.execute_batch("VACUUM; ANALYZE;")?;
        }

        conn.close().map_err(|(_, e)| SlugdexError::from(e))?;
        staging.publish(dest)?;

        let db_size_bytes = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
        let report = BuildReport {
            record_count,
            partitions_read,
            partitions_skipped,
            duration_ms: start.elapsed().as_millis() as u64,
            db_size_bytes,
            reused_existing: false,
        };

        info!(
            "Slug database built: {} slugs, {:.1} MB, {} ms",
            report.record_count,
            report.db_size_bytes as f64 / (1024.0 * 1024.0),
            report.duration_ms
        );

        Ok(report)
    }

    /// Rebuild FTS5 from the slug table and check it covers every row.
    fn finish_fts(&self, conn: &Connection) -> Result<usize> {
        let fts5 = FTS5Manager::new(&self.fts5_config);
        fts5.rebuild(conn).map_err(|e| SlugdexError::Schema {
            message: format!("Failed to rebuild full-text index: {}", e),
        })?;

        let records: usize = conn.query_row("SELECT COUNT(*) FROM slugs", [], |row| row.get(0))?;
        let indexed = fts5.indexed_count(conn)?;
        if indexed != records {
            return Err(SlugdexError::IndexMismatch { records, indexed });
        }
        Ok(records)
    }
}

/// Slug count of an existing, complete store at `dest`; `None` if it is
/// missing, unreadable or empty.
fn populated_count(dest: &Path) -> Option<usize> {
    if !dest.exists() {
        return None;
    }
    let store = SlugStore::open(dest).ok()?;
    if !store.has_schema().ok()? {
        return None;
    }
    store.count().ok().filter(|count| *count > 0)
}

/// Insert a batch in one transaction; returns how many rows were new.
fn insert_batch(conn: &Connection, batch: &[SlugEntry]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    for entry in batch {
        if insert_slug(&tx, &entry.slug, entry.lastmod.as_deref())? {
            inserted += 1;
        }
    }
    tx.commit()?;
    debug!("Committed batch of {} ({} new)", batch.len(), inserted);
    Ok(inserted)
}

/// `dest` with `suffix` appended to its file name (`slugs.db` -> `slugs.db-wal`).
fn sibling_path(dest: &Path, suffix: &str) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    dest.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SlugdexError::io_with_path(e, path)),
    }
}

/// Exclusive advisory lock on `<dest>.lock`, held for the whole build.
struct BuildLock {
    file: File,
    path: PathBuf,
}

impl BuildLock {
    fn acquire(dest: &Path) -> Result<Self> {
        let path = sibling_path(dest, IndexConfig::LOCK_SUFFIX);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| SlugdexError::io_with_path(e, &path))?;

        if file.try_lock_exclusive().is_err() {
            info!("Waiting for build lock at {}", path.display());
            file.lock_exclusive()
                .map_err(|_| SlugdexError::BuildInProgress(path.clone()))?;
        }
        Ok(Self { file, path })
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release build lock {}: {}", self.path.display(), e);
        }
    }
}

/// The `<dest>.building` file; removed on drop unless published.
struct StagingFile {
    path: PathBuf,
    published: bool,
}

impl StagingFile {
    fn create(dest: &Path) -> Result<Self> {
        let path = sibling_path(dest, IndexConfig::BUILDING_SUFFIX);
        // Leftovers from an aborted build.
        remove_if_exists(&path)?;
        remove_if_exists(&sibling_path(&path, "-journal"))?;
        Ok(Self {
            path,
            published: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically move the finished store onto `dest`.
    fn publish(mut self, dest: &Path) -> Result<()> {
        // WAL companions of the old file must not be replayed into the new one.
        remove_if_exists(&sibling_path(dest, "-wal"))?;
        remove_if_exists(&sibling_path(dest, "-shm"))?;

        fs::rename(&self.path, dest).map_err(|e| SlugdexError::Io {
            message: format!("Failed to publish {} to {}", self.path.display(), dest.display()),
            path: Some(dest.to_path_buf()),
            source: Some(e),
        })?;
        self.published = true;
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.published {
            if let Err(e) = remove_if_exists(&self.path) {
                warn!("Failed to remove staging file: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_partition(root: &Path, name: &str, names: &str, dates: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("names.txt"), names).unwrap();
        if let Some(dates) = dates {
            fs::write(dir.join("dates.txt"), dates).unwrap();
        }
    }

    fn sample_corpus() -> TempDir {
        let temp = TempDir::new().unwrap();
        write_partition(
            temp.path(),
            "sitemap-00001",
            "Albert_Einstein\nEinstein_Field_Equations\n",
            Some("2025-10-27\n2025-10-28\n"),
        );
        write_partition(temp.path(), "sitemap-00002", "Albert_Camus\nAlbert_Einstein\n", None);
        temp
    }

    #[test]
    fn test_build_counts_distinct_slugs() {
        let corpus = sample_corpus();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");

        let report = IndexBuilder::new()
            .with_batch_size(2)
            .build(corpus.path(), &dest)
            .unwrap();

        assert_eq!(report.record_count, 3);
        assert_eq!(report.partitions_read, 2);
        assert_eq!(report.partitions_skipped, 0);
        assert!(report.db_size_bytes > 0);

        let store = SlugStore::open(&dest).unwrap();
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.indexed_count().unwrap(), 3);
        // First write wins for the duplicate.
        assert_eq!(
            store.lastmod("Albert_Einstein").unwrap().as_deref(),
            Some("2025-10-27")
        );
    }

    #[test]
    fn test_build_missing_source_root() {
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");
        let result = IndexBuilder::new().build(Path::new("/nonexistent/links"), &dest);
        assert!(matches!(result, Err(SlugdexError::CorpusNotFound(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_build_replaces_existing_store() {
        let corpus = sample_corpus();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");
        IndexBuilder::new().build(corpus.path(), &dest).unwrap();

        let smaller = TempDir::new().unwrap();
        write_partition(smaller.path(), "sitemap-00001", "Isaac_Newton", None);
        let report = IndexBuilder::new().compact(false).build(smaller.path(), &dest).unwrap();

        assert_eq!(report.record_count, 1);
        let store = SlugStore::open(&dest).unwrap();
        assert!(store.exists("isaac_newton").unwrap());
        assert!(!store.exists("Albert_Camus").unwrap());
    }

    #[test]
    fn test_build_leaves_no_staging_file() {
        let corpus = sample_corpus();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");
        IndexBuilder::new().build(corpus.path(), &dest).unwrap();

        assert!(dest.exists());
        assert!(!out.path().join("slugs.db.building").exists());
    }

    #[test]
    fn test_empty_corpus_builds_empty_store() {
        let corpus = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");
        let report = IndexBuilder::new().build(corpus.path(), &dest).unwrap();
        assert_eq!(report.record_count, 0);
        assert_eq!(report.partitions_read, 0);
    }

    fn broken_tokenizer() -> FTS5Config {
        FTS5Config {
            tokenizer: "nosuchtokenizer".to_string(),
            ..FTS5Config::default()
        }
    }

    #[test]
    fn test_failed_build_keeps_previous_store() {
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");
        let first = TempDir::new().unwrap();
        write_partition(first.path(), "sitemap-00001", "Alpha\nBeta", None);
        IndexBuilder::new().build(first.path(), &dest).unwrap();

        let second = TempDir::new().unwrap();
        write_partition(second.path(), "sitemap-00001", "Gamma", None);
        let result = IndexBuilder::new()
            .with_fts5_config(broken_tokenizer())
            .build(second.path(), &dest);

        assert!(matches!(result, Err(SlugdexError::Schema { .. })));
        assert!(!out.path().join("slugs.db.building").exists());
        let store = SlugStore::open(&dest).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        assert!(store.exists("alpha").unwrap());
        assert!(!store.exists("gamma").unwrap());
    }

    #[test]
    fn test_failed_first_build_publishes_nothing() {
        let corpus = sample_corpus();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");

        let result = IndexBuilder::new()
            .with_fts5_config(broken_tokenizer())
            .build(corpus.path(), &dest);

        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!out.path().join("slugs.db.building").exists());
    }

    #[test]
    fn test_build_if_absent_keeps_populated_store() {
        let corpus = sample_corpus();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");
        IndexBuilder::new().build(corpus.path(), &dest).unwrap();

        let bigger = TempDir::new().unwrap();
        write_partition(bigger.path(), "sitemap-00001", "A\nB\nC\nD\nE", None);
        let report = IndexBuilder::new()
            .build_if_absent(bigger.path(), &dest)
            .unwrap();

        assert!(report.reused_existing);
        assert_eq!(report.record_count, 3);
        assert_eq!(SlugStore::open(&dest).unwrap().count().unwrap(), 3);

        // A plain build always replaces.
        let report = IndexBuilder::new().build(bigger.path(), &dest).unwrap();
        assert!(!report.reused_existing);
        assert_eq!(report.record_count, 5);
    }

    #[test]
    fn test_build_if_absent_rechecks_after_waiting_for_lock() {
        let corpus = sample_corpus();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");

        let other = TempDir::new().unwrap();
        write_partition(other.path(), "sitemap-00001", "Isaac_Newton", None);

        let lock = BuildLock::acquire(&dest).unwrap();
        let waiter = {
            let dest = dest.clone();
            let source = corpus.path().to_path_buf();
            thread::spawn(move || IndexBuilder::new().build_if_absent(&source, &dest))
        };
        thread::sleep(Duration::from_millis(100));

        // Publish a store the way a concurrent builder would, then release.
        let staged = out.path().join("staged.db");
        IndexBuilder::new().build(other.path(), &staged).unwrap();
        fs::rename(&staged, &dest).unwrap();
        drop(lock);

        let report = waiter.join().unwrap().unwrap();
        assert!(report.reused_existing);
        assert_eq!(report.record_count, 1);
        assert!(SlugStore::open(&dest).unwrap().exists("isaac_newton").unwrap());
    }

    #[test]
    fn test_build_if_absent_builds_missing_store() {
        let corpus = sample_corpus();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("slugs.db");
        let report = IndexBuilder::new()
            .build_if_absent(corpus.path(), &dest)
            .unwrap();
        assert!(!report.reused_existing);
        assert_eq!(report.record_count, 3);
    }

    #[test]
    fn test_sibling_path() {
        assert_eq!(
            sibling_path(Path::new("/data/slugs.db"), ".lock"),
            PathBuf::from("/data/slugs.db.lock")
        );
        assert_eq!(
            sibling_path(Path::new("slugs.db"), "-wal"),
            PathBuf::from("slugs.db-wal")
        );
    }
}
