//! Entry extraction from a partitioned slug corpus.
//!
//! A corpus root holds partition directories (`sitemap-00001/`, ...), each
//! with an identifier list and an optional parallel timestamp list. Partitions
//! are visited in sorted order so two builds over the same corpus insert rows
//! in the same order.

use crate::config::CorpusConfig;
use crate::error::{Result, SlugdexError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One `(slug, lastmod)` pair read from the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugEntry {
    pub slug: String,
    pub lastmod: Option<String>,
}

/// Directory prefix and file names that make up a corpus.
#[derive(Debug, Clone)]
pub struct CorpusLayout {
    /// Only subdirectories whose name starts with this are partitions.
    /// Empty accepts every subdirectory.
    pub partition_prefix: String,
    pub names_file: String,
    pub dates_file: String,
}

impl Default for CorpusLayout {
    fn default() -> Self {
        Self {
            partition_prefix: CorpusConfig::PARTITION_PREFIX.to_string(),
            names_file: CorpusConfig::NAMES_FILE.to_string(),
            dates_file: CorpusConfig::DATES_FILE.to_string(),
        }
    }
}

impl CorpusLayout {
    /// Layout accepting any subdirectory name as a partition.
    pub fn any_partition() -> Self {
        Self {
            partition_prefix: String::new(),
            ..Self::default()
        }
    }
}

/// Reader over a corpus root.
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    layout: CorpusLayout,
}

impl Corpus {
    /// Open a corpus at `root`. Fails if the root is not a directory.
    pub fn open(root: impl Into<PathBuf>, layout: CorpusLayout) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SlugdexError::CorpusNotFound(root));
        }
        Ok(Self { root, layout })
    }

    /// Partition directories in lexicographic order.
    pub fn partitions(&self) -> Result<Vec<PathBuf>> {
        let mut partitions = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with(&self.layout.partition_prefix) {
                partitions.push(entry.into_path());
            }
        }
        Ok(partitions)
    }

    /// Read every entry of one partition.
    ///
    /// The whole identifier file is read before anything is returned, so an
    /// unreadable or non-UTF-8 file yields an error and no entries.
    pub fn read_partition(&self, partition: &Path) -> Result<Vec<SlugEntry>> {
        let names_path = partition.join(&self.layout.names_file);
        let names =
            fs::read_to_string(&names_path).map_err(|e| SlugdexError::io_with_path(e, &names_path))?;

        let dates_path = partition.join(&self.layout.dates_file);
        let dates = match fs::read_to_string(&dates_path) {
            Ok(dates) => dates,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!(
                    "Ignoring unreadable timestamp file {}: {}",
                    dates_path.display(),
                    e
                );
                String::new()
            }
        };

        Ok(pair_lines(&names, &dates))
    }

    /// Stream entries from every partition in order.
    pub fn entries(&self) -> Result<CorpusEntries<'_>> {
        Ok(CorpusEntries {
            corpus: self,
            partitions: self.partitions()?.into_iter(),
            current: Vec::new().into_iter(),
            partitions_read: 0,
            partitions_skipped: 0,
        })
    }
}

/// Pair identifier lines with timestamp lines by line number.
///
/// Blank identifier lines are skipped but still consume their timestamp line,
/// so line `i` of the names file always pairs with line `i` of the dates
/// file, not with the `i`-th non-blank name. A blank timestamp line is stored
/// as an absent `lastmod`, never as an empty string.
fn pair_lines(names: &str, dates: &str) -> Vec<SlugEntry> {
    let mut dates = dates.lines();
    let mut entries = Vec::new();
    for name in names.lines() {
        let lastmod = dates
            .next()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let slug = name.trim();
        if slug.is_empty() {
            continue;
        }
        entries.push(SlugEntry {
            slug: slug.to_string(),
            lastmod,
        });
    }
    entries
}

/// Iterator over all entries of a corpus, one partition loaded at a time.
///
/// Partitions that fail to load are logged and skipped.
pub struct CorpusEntries<'a> {
    corpus: &'a Corpus,
    partitions: std::vec::IntoIter<PathBuf>,
    current: std::vec::IntoIter<SlugEntry>,
    partitions_read: usize,
    partitions_skipped: usize,
}

impl CorpusEntries<'_> {
    pub fn partitions_read(&self) -> usize {
        self.partitions_read
    }

    pub fn partitions_skipped(&self) -> usize {
        self.partitions_skipped
    }
}

impl Iterator for CorpusEntries<'_> {
    type Item = SlugEntry;

    fn next(&mut self) -> Option<SlugEntry> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(entry);
            }

            let partition = self.partitions.next()?;
            match self.corpus.read_partition(&partition) {
                Ok(entries) => {
                    debug!(
                        "Read {} entries from {}",
                        entries.len(),
                        partition.display()
                    );
                    self.partitions_read += 1;
                    self.current = entries.into_iter();
                }
                Err(e) => {
                    warn!("Skipping partition {}: {}", partition.display(), e);
                    self.partitions_skipped += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_partition(root: &Path, name: &str, names: &str, dates: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("names.txt"), names).unwrap();
        if let Some(dates) = dates {
            fs::write(dir.join("dates.txt"), dates).unwrap();
        }
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let result = Corpus::open("/nonexistent/links", CorpusLayout::default());
        assert!(matches!(result, Err(SlugdexError::CorpusNotFound(_))));
    }

    #[test]
    fn test_partitions_are_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        write_partition(temp.path(), "sitemap-00002", "B", None);
        write_partition(temp.path(), "sitemap-00001", "A", None);
        write_partition(temp.path(), "other", "C", None);
        fs::write(temp.path().join("sitemap-00003"), "not a dir").unwrap();

        let corpus = Corpus::open(temp.path(), CorpusLayout::default()).unwrap();
        let names: Vec<String> = corpus
            .partitions()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["sitemap-00001", "sitemap-00002"]);

        let any = Corpus::open(temp.path(), CorpusLayout::any_partition()).unwrap();
        assert_eq!(any.partitions().unwrap().len(), 3);
    }

    #[test]
    fn test_dates_pair_by_line() {
        let entries = pair_lines("Alpha\nBeta\nGamma\n", "2024-01-01\n\n");
        assert_eq!(
            entries,
            vec![
                SlugEntry {
                    slug: "Alpha".into(),
                    lastmod: Some("2024-01-01".into())
                },
                SlugEntry {
                    slug: "Beta".into(),
                    lastmod: None
                },
                SlugEntry {
                    slug: "Gamma".into(),
                    lastmod: None
                },
            ]
        );
    }

    #[test]
    fn test_blank_lines_skipped() {
        let entries = pair_lines("Alpha\n\n  \nDelta\r\n", "d1\nd2\nd3\nd4\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].slug, "Delta");
        assert_eq!(entries[1].lastmod.as_deref(), Some("d4"));
    }

    #[test]
    fn test_entries_skip_broken_partition() {
        let temp = TempDir::new().unwrap();
        write_partition(temp.path(), "sitemap-00001", "Alpha\nBeta", Some("d1\nd2"));
        // No names.txt in this one.
        fs::create_dir_all(temp.path().join("sitemap-00002")).unwrap();
        write_partition(temp.path(), "sitemap-00003", "Gamma", None);

        let corpus = Corpus::open(temp.path(), CorpusLayout::default()).unwrap();
        let mut entries = corpus.entries().unwrap();
        let slugs: Vec<String> = entries.by_ref().map(|e| e.slug).collect();

        assert_eq!(slugs, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(entries.partitions_read(), 2);
        assert_eq!(entries.partitions_skipped(), 1);
    }

    #[test]
    fn test_non_utf8_partition_is_skipped_whole() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("sitemap-00001");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("names.txt"), b"Good\n\xff\xfe\n").unwrap();
        write_partition(temp.path(), "sitemap-00002", "Other", None);

        let corpus = Corpus::open(temp.path(), CorpusLayout::default()).unwrap();
        let slugs: Vec<String> = corpus.entries().unwrap().map(|e| e.slug).collect();
        assert_eq!(slugs, vec!["Other"]);
    }
}
