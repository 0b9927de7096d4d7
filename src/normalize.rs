//! Normalization of station metadata into catalog search strings.
//!
//! Titles go through `normalize_track` (stopwords dropped), artist names
//! through `normalize_artist` (stopwords and periods kept). Both are pure
//! and idempotent.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Characters removed when stopwords are also being removed.
pub static DISALLOWED_STRICT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9$ñ -]+").unwrap());

/// Same as `DISALLOWED_STRICT` but keeps periods (abbreviations, "feat.").
pub static DISALLOWED_KEEP_PERIODS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9$ñ. -]+").unwrap());

/// Tokens dropped when `remove_extra_words` is set.
pub const EXTRA_WORDS: [&str; 4] = ["the", "feat", "feat.", "featuring"];

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Strip diacritics via NFKD decomposition, leaving a precomposed `ñ`
/// intact. Everything in the Unicode Mark category is dropped after
/// decomposition, so stacked marks (e.g. Vietnamese) go too.
/// e.g., "beyoncé" → "beyonce", "señorita" → "señorita"
pub fn fold_diacritics(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == 'ñ' {
            out.push(c);
            continue;
        }
        out.extend(std::iter::once(c).nfkd().filter(|&d| !is_combining_mark(d)));
    }
    out
}

fn is_hyphen_run(token: &str) -> bool {
    token.chars().all(|c| c == '-')
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize free-form metadata for catalog search.
///
/// Lowercases, folds diacritics, strips everything but letters, digits,
/// `$`, `ñ`, spaces and hyphens (plus periods when `remove_extra_words`
/// is false), collapses whitespace and drops hyphen-only tokens. With
/// `remove_extra_words`, the tokens in `EXTRA_WORDS` are dropped too.
pub fn normalize(text: &str, remove_extra_words: bool) -> String {
    let lowered = fold_diacritics(&text.to_lowercase());
    let spaced: String = lowered
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    let filter = if remove_extra_words {
        &*DISALLOWED_STRICT
    } else {
        &*DISALLOWED_KEEP_PERIODS
    };
    let cleaned = filter.replace_all(&spaced, "");

    cleaned
        .split_whitespace()
        .filter(|token| !is_hyphen_run(token))
        .filter(|token| !(remove_extra_words && EXTRA_WORDS.contains(token)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Track titles: stopwords removed.
pub fn normalize_track(title: &str) -> String {
    normalize(title, true)
}

/// Artist names: stopwords and periods kept.
pub fn normalize_artist(artist: &str) -> String {
    normalize(artist, false)
}

// ============================================================================
// TESTS
// ============================================================================
