//! Slugdex Core - resolve possibly misspelled article names to canonical slugs.
//!
//! The corpus can hold tens of millions of slugs, so everything lives in a
//! single SQLite file with an FTS5 index instead of in memory. The crate is
//! synchronous; callers on an async runtime should wrap calls in
//! `spawn_blocking`.
//!
//! # Example
//!
//! ```rust,ignore
//! use slugdex_core::{IndexSettings, SlugIndex};
//!
//! let index = SlugIndex::new(
//!     IndexSettings::new("slugs.db").with_source_root("links"),
//! );
//!
//! // Builds the store on first use if it does not exist yet.
//! let candidates = index.search("albert einstien", 10, true);
//! println!("{} of {} articles matched", candidates.len(), index.total_count());
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod pool;

pub use config::{IndexConfig, IndexSettings};
pub use corpus::{Corpus, CorpusLayout, SlugEntry};
pub use error::{Result, SlugdexError};
pub use index::{BuildReport, IndexBuilder, MatchStrategy, SlugStore};
pub use lifecycle::{IndexHandle, IndexStatus, SlugIndex};
pub use pool::{ConnectionPool, PooledStore};

/// Build the store at `dest` from the corpus at `source_root`.
///
/// Returns the number of distinct slugs loaded. Callers packaging a
/// deployment should treat zero as a failure.
pub fn build_index(
    source_root: impl AsRef<std::path::Path>,
    dest: impl AsRef<std::path::Path>,
) -> Result<usize> {
    IndexBuilder::new()
        .build(source_root.as_ref(), dest.as_ref())
        .map(|report| report.record_count)
}
