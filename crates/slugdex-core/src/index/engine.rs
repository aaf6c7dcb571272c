//! Match cascade that resolves a free-form query to candidate slugs.
//!
//! Strategies run cheapest first and stop as soon as `limit` slugs are
//! collected. A slug produced by an earlier strategy is never emitted again.

use std::collections::HashSet;
use tracing::{debug, warn};

use super::normalize::NormalizedQuery;
use super::query::build_fts5_query;
use super::store::SlugStore;
use crate::Result;

/// One step of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// `slug_lower` equals the lowercased query.
    Exact,
    /// `normalized` starts with the normalized query.
    Prefix,
    /// `normalized` contains the normalized query.
    Contains,
    /// Every query token as an FTS5 prefix term.
    FullText,
}

impl MatchStrategy {
    /// Cost-ascending order.
    pub const CASCADE: [MatchStrategy; 4] = [
        MatchStrategy::Exact,
        MatchStrategy::Prefix,
        MatchStrategy::Contains,
        MatchStrategy::FullText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Prefix => "prefix",
            MatchStrategy::Contains => "contains",
            MatchStrategy::FullText => "fulltext",
        }
    }

    /// Candidates for this strategy, possibly overlapping earlier ones.
    pub fn run(&self, store: &SlugStore, query: &NormalizedQuery, limit: usize) -> Result<Vec<String>> {
        match self {
            MatchStrategy::Exact => Ok(store.exact(&query.lower)?.into_iter().collect()),
            MatchStrategy::Prefix => store.prefix_matches(&query.normalized, limit),
            MatchStrategy::Contains => store.contains_matches(&query.normalized, limit),
            MatchStrategy::FullText => {
                let fts_query = build_fts5_query(&query.normalized);
                if fts_query.is_empty() {
                    return Ok(Vec::new());
                }
                store.fulltext_matches(&fts_query, limit)
            }
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run the cascade against one store connection.
///
/// Never fails: a strategy that errors contributes nothing and the cascade
/// moves on. FTS5 syntax errors are expected for odd input and are logged at
/// debug level only.
pub fn search(store: &SlugStore, query: &NormalizedQuery, limit: usize, fuzzy: bool) -> Vec<String> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();

    for strategy in MatchStrategy::CASCADE {
        if results.len() >= limit {
            break;
        }
        if strategy == MatchStrategy::FullText && !fuzzy {
            break;
        }

        // Fetch `limit` rather than the remainder: up to `results.len()` of the
        // rows can be repeats of earlier hits.
        match strategy.run(store, query, limit) {
            Ok(candidates) => {
                for slug in candidates {
                    if results.len() >= limit {
                        break;
                    }
                    if seen.insert(slug.clone()) {
                        results.push(slug);
                    }
                }
            }
            Err(e) if strategy == MatchStrategy::FullText => {
                debug!("FTS search failed for {:?}: {}", query.normalized, e);
            }
            Err(e) => {
                warn!("{} match failed for {:?}: {}", strategy, query.normalized, e);
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fts5::{FTS5Config, FTS5Manager};
    use crate::index::store::{create_schema, insert_slug};
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn create_test_store(slugs: &[&str]) -> (SlugStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("slugs.db");
        let conn = Connection::open(&db_path).unwrap();
        let config = FTS5Config::default();
        create_schema(&conn, &config).unwrap();
        for slug in slugs {
            insert_slug(&conn, slug, None).unwrap();
        }
        FTS5Manager::new(&config).rebuild(&conn).unwrap();
        drop(conn);
        (SlugStore::open(&db_path).unwrap(), temp_dir)
    }

    fn einstein_store() -> (SlugStore, TempDir) {
        create_test_store(&["Albert_Einstein", "Einstein_Field_Equations", "Albert_Camus"])
    }

    fn q(text: &str) -> NormalizedQuery {
        NormalizedQuery::parse(text).unwrap()
    }

    #[test]
    fn test_exact_match_comes_first() {
        let (store, _temp) = einstein_store();
        let results = search(&store, &q("ALBERT_EINSTEIN"), 10, true);
        assert_eq!(results[0], "Albert_Einstein");
    }

    #[test]
    fn test_substring_hits_without_fuzzy() {
        let (store, _temp) = einstein_store();
        let results = search(&store, &q("einstein"), 10, false);
        assert_eq!(results, vec!["Einstein_Field_Equations", "Albert_Einstein"]);
    }

    #[test]
    fn test_fulltext_only_when_fuzzy() {
        let (store, _temp) = einstein_store();
        assert!(search(&store, &q("einstein albert"), 10, false).is_empty());
        assert_eq!(
            search(&store, &q("einstein albert"), 10, true),
            vec!["Albert_Einstein"]
        );
    }

    #[test]
    fn test_limit_and_no_duplicates() {
        let (store, _temp) = einstein_store();
        for limit in 0..5 {
            let results = search(&store, &q("albert"), limit, true);
            assert!(results.len() <= limit);
            let unique: HashSet<_> = results.iter().collect();
            assert_eq!(unique.len(), results.len());
        }
        assert_eq!(search(&store, &q("albert"), 10, true).len(), 2);
    }

    #[test]
    fn test_later_strategies_fill_after_duplicates() {
        let (store, _temp) = create_test_store(&["Rome", "Rome_Italy", "Ancient_Rome"]);
        // Exact hit "Rome" is also the first prefix and contains row.
        assert_eq!(
            search(&store, &q("rome"), 3, false),
            vec!["Rome", "Rome_Italy", "Ancient_Rome"]
        );
    }

    #[test]
    fn test_malformed_fulltext_input_keeps_earlier_results() {
        let (store, _temp) = create_test_store(&["C++", "C++_Builder", "Objective-C"]);
        let results = search(&store, &q("c++"), 10, true);
        assert_eq!(&results[..2], &["C++", "C++_Builder"]);

        // Bare syntax characters must not turn into an error.
        let results = search(&store, &q("\" * ( )"), 10, true);
        assert!(results.len() <= 10);
    }

    #[test]
    fn test_strategy_names() {
        let names: Vec<&str> = MatchStrategy::CASCADE.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["exact", "prefix", "contains", "fulltext"]);
    }
}
