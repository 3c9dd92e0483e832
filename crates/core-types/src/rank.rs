//! Candidate ranking helpers shared by every strategy

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::selector::{ElementSelector, SelectorKind};

/// Default number of alternatives carried on a result
pub const DEFAULT_MAX_ALTERNATIVES: usize = 5;

/// Deduplicate on `(kind, value)` keeping the highest confidence, then sort
/// descending. The sort is stable, so equal scores keep generation order.
pub fn rank_selectors(candidates: Vec<ElementSelector>) -> Vec<ElementSelector> {
    let mut positions: HashMap<(SelectorKind, String), usize> = HashMap::new();
    let mut ranked: Vec<ElementSelector> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let key = (candidate.kind, candidate.value.clone());
        match positions.get(&key) {
            Some(&index) => {
                if candidate.confidence > ranked[index].confidence {
                    ranked[index] = candidate;
                }
            }
            None => {
                positions.insert(key, ranked.len());
                ranked.push(candidate);
            }
        }
    }

    ranked.sort_by(compare_confidence_desc);
    ranked
}

/// Rank and keep the top `max`
pub fn cap_alternatives(candidates: Vec<ElementSelector>, max: usize) -> Vec<ElementSelector> {
    let mut ranked = rank_selectors(candidates);
    ranked.truncate(max);
    ranked
}

pub fn compare_confidence_desc(a: &ElementSelector, b: &ElementSelector) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
}

/// True when every confidence is in range and the list is non-increasing
pub fn is_ranked(candidates: &[ElementSelector]) -> bool {
    candidates
        .iter()
        .all(|c| (0.0..=1.0).contains(&c.confidence))
        && candidates
            .windows(2)
            .all(|pair| pair[0].confidence >= pair[1].confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_dedupes_and_sorts() {
        let ranked = rank_selectors(vec![
            ElementSelector::css(".a", 0.7),
            ElementSelector::css("#x", 0.95),
            ElementSelector::css(".a", 0.8),
            ElementSelector::xpath(".a", 0.5),
        ]);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].value, "#x");
        assert_eq!(ranked[1].value, ".a");
        assert_eq!(ranked[1].confidence, 0.8);
        assert!(is_ranked(&ranked));
    }

    #[test]
    fn test_stable_for_ties() {
        let ranked = rank_selectors(vec![
            ElementSelector::css("first", 0.5),
            ElementSelector::css("second", 0.5),
        ]);
        assert_eq!(ranked[0].value, "first");
    }

    #[test]
    fn test_cap() {
        let candidates = (0..10)
            .map(|i| ElementSelector::css(format!(".c{}", i), i as f64 / 10.0))
            .collect();
        let capped = cap_alternatives(candidates, DEFAULT_MAX_ALTERNATIVES);
        assert_eq!(capped.len(), 5);
        assert_eq!(capped[0].value, ".c9");
    }
}
