//! Text similarity
//!
//! Four independent measures over normalized text. The combined score is
//! their maximum, so a pair only needs to look alike under one of them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Per-measure breakdown for one pair of strings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextMeasures {
    pub levenshtein: f64,
    pub fuzzy: f64,
    pub jaccard: f64,
    pub lcs: f64,
}

impl TextMeasures {
    pub fn best(&self) -> f64 {
        self.levenshtein
            .max(self.fuzzy)
            .max(self.jaccard)
            .max(self.lcs)
    }
}

/// Trim, lowercase and collapse internal whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn measures(a: &str, b: &str) -> TextMeasures {
    let (a, b) = (normalize(a), normalize(b));
    TextMeasures {
        levenshtein: strsim::normalized_levenshtein(&a, &b),
        fuzzy: fuzzy_ratio(&a, &b),
        jaccard: jaccard(&a, &b),
        lcs: lcs_ratio(&a, &b),
    }
}

/// Combined similarity in `[0, 1]`; symmetric, and 1.0 for equal inputs
pub fn text_similarity(a: &str, b: &str) -> f64 {
    measures(a, b).best().clamp(0.0, 1.0)
}

// Jaro matching is greedy left to right, so score both directions
fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b).max(strsim::jaro_winkler(b, a))
}

fn jaccard(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split(' ').filter(|w| !w.is_empty()).collect();
    let right: BTreeSet<&str> = b.split(' ').filter(|w| !w.is_empty()).collect();
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f64 / union as f64
}

/// Longest common subsequence length over the longer input's length
fn lcs_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()] as f64 / longest as f64
}

/// Words longer than two characters, stripped of surrounding punctuation
pub fn significant_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_scores_one() {
        for text in ["Submit Order", "", "  spaced   out  ", "naïve café"] {
            assert_eq!(text_similarity(text, text), 1.0);
        }
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ("Submit Order", "Submit your order"),
            ("Sign in", "Log in"),
            ("martha", "marhta"),
            ("Add to cart", "Checkout"),
            ("abcdef", "fedcba"),
        ];
        for (a, b) in pairs {
            assert!(
                (text_similarity(a, b) - text_similarity(b, a)).abs() < 1e-12,
                "{} / {}",
                a,
                b
            );
        }
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize("  Submit \n  ORDER "), "submit order");
        assert_eq!(text_similarity("SUBMIT ORDER", "submit   order"), 1.0);
    }

    #[test]
    fn test_max_of_measures() {
        // Same words, different order: jaccard carries the score
        let m = measures("order submit", "submit order");
        assert_eq!(m.jaccard, 1.0);
        assert_eq!(text_similarity("order submit", "submit order"), 1.0);
    }

    #[test]
    fn test_lcs_ratio() {
        assert!((lcs_ratio("abcde", "ace") - 0.6).abs() < 1e-9);
        assert_eq!(lcs_ratio("", ""), 1.0);
        assert_eq!(lcs_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_unrelated_texts_score_low() {
        assert!(text_similarity("Add to cart", "Privacy policy") < 0.6);
    }

    #[test]
    fn test_significant_words() {
        assert_eq!(
            significant_words("Go to the checkout, now!"),
            vec!["the", "checkout", "now"]
        );
    }
}
