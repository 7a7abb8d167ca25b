//! Text normalization and string similarity shared by title search, person
//! search and recommendation filters.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Highest score a non-identical title can reach. Identical titles (after
/// normalization) always score 1.0.
const MAX_INEXACT_SIMILARITY: f64 = 0.94;

/// Shortest string that may count as contained in a longer one
const MIN_CONTAINED_LEN: usize = 3;

/// Lowercases, strips diacritics and collapses punctuation to single spaces.
///
/// `"Amélie!"` becomes `"amelie"`, `"Spider-Man: No Way Home"` becomes
/// `"spider man no way home"`.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `needle` occurs in `haystack` on word boundaries. Both arguments
/// must already be normalized.
pub fn contains_words(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

/// Similarity of a searched title against a stored title, in [0, 1].
///
/// Combines edit distance, bigram overlap and word-boundary containment, so
/// partial titles ("matrix" against "The Matrix Reloaded") still rank.
pub fn title_similarity(query: &str, title: &str) -> f32 {
    let q = normalize(query);
    let t = normalize(title);
    if q.is_empty() || t.is_empty() {
        return 0.0;
    }
    if q == t {
        return 1.0;
    }

    let edit = strsim::normalized_levenshtein(&q, &t);
    let dice = strsim::sorensen_dice(&q, &t);
    let containment = containment_score(&q, &t);

    edit.max(dice).max(containment).min(MAX_INEXACT_SIMILARITY) as f32
}

fn containment_score(a: &str, b: &str) -> f64 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.len() < MIN_CONTAINED_LEN || !contains_words(long, short) {
        return 0.0;
    }
    0.5 + 0.45 * (short.len() as f64 / long.len() as f64)
}

/// How a searched name relates to a stored person name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameMatch {
    None,
    Partial,
    Exact,
}

pub fn name_match(query: &str, name: &str) -> NameMatch {
    let q = normalize(query);
    let n = normalize(name);
    if q.is_empty() || n.is_empty() {
        NameMatch::None
    } else if q == n {
        NameMatch::Exact
    } else if contains_words(&n, &q) {
        NameMatch::Partial
    } else {
        NameMatch::None
    }
}
