//! Lexical similarity metrics for comparing generated text against references.
//!
//! No single metric captures summary quality on its own, so several are
//! combined:
//! - Cosine similarity over word-frequency vectors (bag-of-words)
//! - Jaccard similarity over word sets (vocabulary overlap)
//! - Overlap coefficient (lenient for length differences)
//! - A weighted composite of the three (the primary quality gate)
//! - N-gram precision and a simplified BLEU score
//! - Required-term coverage and word-count validation
//!
//! Generator outputs are non-deterministic, so callers gate on similarity
//! thresholds (typically 0.80+) rather than exact string matching. All
//! functions are pure and operate on whitespace/regex tokenization only:
//! there is no stemming, no embedding, and no semantic model involved.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Weight of cosine similarity in the composite score.
pub const COSINE_WEIGHT: f64 = 0.5;
/// Weight of Jaccard similarity in the composite score.
pub const JACCARD_WEIGHT: f64 = 0.3;
/// Weight of the overlap coefficient in the composite score.
pub const OVERLAP_WEIGHT: f64 = 0.2;

/// Result of checking a text for required terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermCoverage {
    /// True when every required term was found
    pub passed: bool,

    /// Fraction of required terms found (1.0 for an empty term list)
    pub coverage: f64,

    /// Terms that did not appear in the text
    pub missing: Vec<String>,
}

/// Result of validating a text's word count against inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthCheck {
    /// True when the word count is within `[min_words, max_words]`
    pub passed: bool,

    /// Actual word count after tokenization
    pub word_count: usize,
}

/// Cosine similarity between the word-frequency vectors of two texts.
///
/// Builds the union vocabulary, forms a frequency vector per text, and
/// returns `dot(v1, v2) / (‖v1‖ · ‖v2‖)`. Returns 0.0 when either text
/// tokenizes to nothing.
///
/// Word order is ignored and synonyms count as different words; this is a
/// frequency measure, not a semantic one.
#[must_use]
pub fn cosine_similarity(text1: &str, text2: &str) -> f64 {
    let words1 = tokenize(text1);
    let words2 = tokenize(text2);

    let vocab: HashSet<&str> = words1
        .iter()
        .chain(words2.iter())
        .map(String::as_str)
        .collect();

    let counts1 = word_counts(&words1);
    let counts2 = word_counts(&words2);

    let mut dot = 0.0_f64;
    let mut mag1 = 0.0_f64;
    let mut mag2 = 0.0_f64;

    for word in vocab {
        let v1 = f64::from(counts1.get(word).copied().unwrap_or(0));
        let v2 = f64::from(counts2.get(word).copied().unwrap_or(0));
        dot += v1 * v2;
        mag1 += v1 * v1;
        mag2 += v2 * v2;
    }

    // Empty text has zero magnitude
    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    dot / (mag1.sqrt() * mag2.sqrt())
}

/// Jaccard similarity: `|A ∩ B| / |A ∪ B|` over the word sets of two texts.
///
/// Frequency is ignored; every unique word counts once. Returns 0.0 when
/// the union is empty (both texts tokenize to nothing).
#[must_use]
pub fn jaccard_similarity(text1: &str, text2: &str) -> f64 {
    let set1: HashSet<String> = tokenize(text1).into_iter().collect();
    let set2: HashSet<String> = tokenize(text2).into_iter().collect();

    let intersection = set1.intersection(&set2).count();
    let union = set1.union(&set2).count();

    if union == 0 {
        return 0.0;
    }

    intersection as f64 / union as f64
}

/// Overlap coefficient (Szymkiewicz–Simpson): `|A ∩ B| / min(|A|, |B|)`.
///
/// Normalizes by the smaller word set instead of the union, so a short
/// summary fully contained in a longer one scores 1.0. Always greater than
/// or equal to [`jaccard_similarity`] for the same inputs. Returns 0.0 when
/// the smaller set is empty.
#[must_use]
pub fn overlap_coefficient(text1: &str, text2: &str) -> f64 {
    let set1: HashSet<String> = tokenize(text1).into_iter().collect();
    let set2: HashSet<String> = tokenize(text2).into_iter().collect();

    let intersection = set1.intersection(&set2).count();
    let min_size = set1.len().min(set2.len());

    if min_size == 0 {
        return 0.0;
    }

    intersection as f64 / min_size as f64
}

/// Weighted blend of cosine, Jaccard, and overlap scores.
///
/// `0.5·cosine + 0.3·jaccard + 0.2·overlap`. The weights are module
/// constants summing to 1.0, not per-call parameters; cosine dominates
/// because frequency carries the most signal for summaries, Jaccard
/// validates vocabulary coverage, and overlap compensates for length
/// differences.
///
/// This is the primary quality gate used by the evaluator.
#[must_use]
pub fn composite_similarity(text1: &str, text2: &str) -> f64 {
    COSINE_WEIGHT * cosine_similarity(text1, text2)
        + JACCARD_WEIGHT * jaccard_similarity(text1, text2)
        + OVERLAP_WEIGHT * overlap_coefficient(text1, text2)
}

/// Check that every required term appears in the text.
///
/// Matching is case-insensitive and whole-word (word-boundary anchored), so
/// "cat" does not match inside "caterpillar". An empty term list is a
/// vacuous pass with coverage 1.0.
#[must_use]
pub fn contains_required_terms(text: &str, required_terms: &[String]) -> TermCoverage {
    if required_terms.is_empty() {
        return TermCoverage {
            passed: true,
            coverage: 1.0,
            missing: Vec::new(),
        };
    }

    let text_lower = text.to_lowercase();

    let mut found = 0usize;
    let mut missing = Vec::new();

    for term in required_terms {
        if term_matches(&text_lower, term) {
            found += 1;
        } else {
            missing.push(term.clone());
        }
    }

    TermCoverage {
        passed: missing.is_empty(),
        coverage: found as f64 / required_terms.len() as f64,
        missing,
    }
}

/// Validate that the text's word count falls within `[min_words, max_words]`
/// (inclusive).
///
/// # Errors
///
/// Returns an error when `min_words > max_words`; that is a malformed
/// threshold configuration, not a failed check.
pub fn validate_length(
    text: &str,
    min_words: usize,
    max_words: usize,
) -> anyhow::Result<LengthCheck> {
    if min_words > max_words {
        anyhow::bail!("min_words ({min_words}) cannot be greater than max_words ({max_words})");
    }

    let word_count = tokenize(text).len();

    Ok(LengthCheck {
        passed: (min_words..=max_words).contains(&word_count),
        word_count,
    })
}

/// Fraction of candidate n-grams that appear in the reference.
///
/// N-grams are extracted with a sliding window of step 1. Each reference
/// occurrence can satisfy at most one candidate match (the reference
/// frequency map is decremented as matches are consumed), so repeated
/// candidate n-grams cannot inflate precision. Returns 0.0 when the
/// candidate has no n-grams of the requested size.
#[must_use]
pub fn ngram_precision(reference: &str, candidate: &str, n: usize) -> f64 {
    let ref_ngrams = ngrams(&tokenize(reference), n);
    let cand_ngrams = ngrams(&tokenize(candidate), n);

    if cand_ngrams.is_empty() {
        return 0.0;
    }

    let mut ref_counts: HashMap<String, u32> = HashMap::new();
    for ngram in ref_ngrams {
        *ref_counts.entry(ngram).or_insert(0) += 1;
    }

    let mut matches = 0usize;
    for ngram in &cand_ngrams {
        if let Some(count) = ref_counts.get_mut(ngram) {
            if *count > 0 {
                matches += 1;
                *count -= 1;
            }
        }
    }

    matches as f64 / cand_ngrams.len() as f64
}

/// Simplified BLEU score: arithmetic mean of unigram and bigram precision.
///
/// This is deliberately not standard BLEU: full BLEU takes the geometric
/// mean of precisions up to 4-grams and applies a brevity penalty. The
/// simplification is adequate as a secondary, informational signal next to
/// [`composite_similarity`]; callers expecting standard BLEU values should
/// not compare scores across tools.
#[must_use]
pub fn bleu_score(reference: &str, candidate: &str) -> f64 {
    let p1 = ngram_precision(reference, candidate, 1);
    let p2 = ngram_precision(reference, candidate, 2);
    (p1 + p2) / 2.0
}

/// Tokenize: lowercase, strip punctuation (keep alphanumerics, underscores,
/// and whitespace), split on whitespace, drop empties.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn word_counts(words: &[String]) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for word in words {
        *counts.entry(word.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Whole-word, case-insensitive match of a single term. `text` must already
/// be lowercased.
fn term_matches(text: &str, term: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(&term.to_lowercase()));
    Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false)
}

fn ngrams(tokens: &[String], n: usize) -> Vec<String> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }
    tokens.windows(n).map(|w| w.join(" ")).collect()
}
