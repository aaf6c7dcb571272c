//! FTS5 and LIKE query building utilities.

use regex::Regex;
use std::sync::LazyLock;

/// Anything outside letters and digits may be FTS5 syntax.
static FTS5_SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]").expect("static regex"));

/// Escape a term for FTS5 queries.
///
/// Terms containing anything but letters and digits are wrapped in quotes,
/// which FTS5 always parses as a phrase.
pub fn escape_fts5_term(term: &str) -> String {
    if FTS5_SPECIAL_CHARS.is_match(term) {
        let escaped = term.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        term.to_string()
    }
}

/// Build an FTS5 query from an already normalized search string.
///
/// Every whitespace-separated token becomes a prefix term and the terms are
/// joined by FTS5's implicit AND:
/// - "albert ein" → `albert* ein*`
/// - "c++ language" → `"c++"* language*`
pub fn build_fts5_query(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .map(|term| format!("{}*", escape_fts5_term(term)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Exclusive upper bound for an indexed prefix range scan.
///
/// `col >= prefix AND col < prefix_upper_bound(prefix)` selects the rows that
/// start with `prefix` under SQLite's BINARY collation, since U+10FFFF has the
/// greatest UTF-8 encoding.
pub fn prefix_upper_bound(prefix: &str) -> String {
    let mut bound = String::with_capacity(prefix.len() + 4);
    bound.push_str(prefix);
    bound.push(char::MAX);
    bound
}
