//! Case folding and word-separator normalization.
//!
//! `slug_lower` and `normalized` columns are derived from `slug` only through
//! these functions, and queries go through the same functions before matching.

use crate::config::IndexConfig;

/// Case-folded form of a slug.
pub fn slug_lower(slug: &str) -> String {
    slug.to_lowercase()
}

/// Case-folded slug with the word separator replaced by a space.
pub fn normalize_slug(slug: &str) -> String {
    slug_lower(slug).replace(IndexConfig::WORD_SEPARATOR, " ")
}

/// A user query prepared for every match strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// Lowercased and trimmed; compared against `slug_lower`.
    pub lower: String,
    /// Lowercased, separator replaced, trimmed; compared against `normalized`.
    pub normalized: String,
}

impl NormalizedQuery {
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(query: &str) -> Option<Self> {
        let normalized = normalize_slug(query).trim().to_string();
        if normalized.is_empty() {
            return None;
        }
        Some(Self {
            lower: slug_lower(query).trim().to_string(),
            normalized,
        })
    }
}
