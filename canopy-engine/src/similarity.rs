//! Similarity Kernel
//!
//! Pure string normalization and similarity functions used by the
//! identity matcher. Total and side-effect-free: same inputs always
//! produce the same output, so results are trivially cacheable.

use std::collections::HashSet;

/// Legal-entity suffixes stripped from the end of a name, longest first
/// so "corp" wins over "co"
const LEGAL_SUFFIXES: [&str; 5] = ["corp", "inc", "llc", "ltd", "co"];

/// Street-type abbreviations expanded during address normalization
const STREET_EXPANSIONS: [(&str, &str); 5] = [
    ("st", "street"),
    ("ave", "avenue"),
    ("blvd", "boulevard"),
    ("dr", "drive"),
    ("rd", "road"),
];

/// Normalize a company name for comparison
///
/// Lowercases, trims, and strips one trailing legal-entity suffix
/// (Inc, LLC, Corp, Co, Ltd, with or without a trailing period). The
/// suffix must stand as its own word at the end of the string; a name
/// like "Costco" is left alone.
///
/// # Arguments
/// * `raw` - Name as it appears in the source system
pub fn normalize_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let trimmed = lowered.strip_suffix('.').unwrap_or(&lowered);
    for suffix in LEGAL_SUFFIXES {
        if let Some(stem) = trimmed.strip_suffix(suffix) {
            if stem.ends_with(char::is_whitespace) {
                return stem.trim_end().to_string();
            }
        }
    }
    lowered
}

/// Normalize an address line for comparison
///
/// Lowercases, trims, collapses runs of whitespace, and expands
/// street-type abbreviations (St, Ave, Blvd, Dr, Rd) where they stand
/// as their own word, with or without a trailing period. Substrings of
/// larger words ("1st", "austin") are never touched.
///
/// # Arguments
/// * `raw` - Address line as it appears in the source system
pub fn normalize_address(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    lowered
        .split_whitespace()
        .map(|token| {
            let word = token.strip_suffix('.').unwrap_or(token);
            for (abbr, full) in STREET_EXPANSIONS {
                if word == abbr {
                    return full;
                }
            }
            token
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Character-bigram Jaccard similarity between two strings
///
/// Builds the set of adjacent character pairs for each string and
/// returns |A ∩ B| / |A ∪ B|. Identical strings of length >= 2 score
/// 1.0 and the function is symmetric.
///
/// # Returns
/// Similarity in [0, 1]; 0.0 if either input has fewer than 2
/// characters (no bigrams to compare).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_bigrams = bigrams(a);
    let b_bigrams = bigrams(b);
    if a_bigrams.is_empty() || b_bigrams.is_empty() {
        return 0.0;
    }

    let intersection = a_bigrams.intersection(&b_bigrams).count();
    let union = a_bigrams.union(&b_bigrams).count();
    intersection as f64 / union as f64
}

fn bigrams(s: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|pair| (pair[0], pair[1])).collect()
}
