//! SQLite slug index with FTS5 full-text search.
//!
//! This module provides:
//! - The slug table schema and indexed lookups
//! - FTS5 setup, rebuild and query building
//! - The batch builder and the match cascade

mod builder;
mod engine;
mod fts5;
mod normalize;
mod query;
mod store;

pub use builder::{BuildReport, IndexBuilder};
pub use engine::{search, MatchStrategy};
pub use fts5::{FTS5Config, FTS5Manager};
pub use normalize::{normalize_slug, slug_lower, NormalizedQuery};
pub use query::{build_fts5_query, escape_fts5_term, escape_like};
pub use store::{create_schema, insert_slug, SlugStore};
