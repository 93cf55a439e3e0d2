//! Approximate string matching for device name resolution.
//!
//! Comparison is case-insensitive and ignores surrounding whitespace.
//! Distance is plain Levenshtein (unit cost for insert, delete,
//! substitute), computed with the two-row formulation over the shorter
//! string so space stays `O(min(|a|, |b|))`.

/// Default similarity threshold used by the device registry.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

fn normalize(s: &str) -> Vec<char> {
    s.trim().to_lowercase().chars().collect()
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    // Iterate over the longer string, keep rows sized by the shorter one.
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if inner.is_empty() {
        return outer.len();
    }

    let mut prev: Vec<usize> = (0..=inner.len()).collect();
    let mut curr: Vec<usize> = vec![0; inner.len() + 1];

    for (i, oc) in outer.iter().enumerate() {
        curr[0] = i + 1;
        for (j, ic) in inner.iter().enumerate() {
            let substitution = prev[j] + usize::from(oc != ic);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[inner.len()]
}

/// Edit distance between two strings after normalization.
pub fn distance(a: &str, b: &str) -> usize {
    levenshtein(&normalize(a), &normalize(b))
}

/// Similarity in `[0, 1]`. Identical strings score `1.0`; if either
/// side is empty after trimming the score is `0.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let max_len = a.len().max(b.len());
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// A candidate index paired with its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Index into the candidate slice.
    pub index: usize,
    /// Similarity against the query.
    pub score: f64,
}

/// The single candidate scoring strictly above `threshold`, highest
/// score winning; ties go to the earlier candidate.
pub fn best_match(query: &str, candidates: &[&str], threshold: f64) -> Option<Match> {
    let mut best: Option<Match> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let score = similarity(query, candidate);
        if score <= threshold {
            continue;
        }
        let better = match best {
            Some(b) => score > b.score,
            None => true,
        };
        if better {
            best = Some(Match { index, score });
        }
    }
    best
}

/// All candidates scoring at least `threshold`, best first. Equal
/// scores keep candidate order. `limit` trims the tail when set.
pub fn top_matches(
    query: &str,
    candidates: &[&str],
    threshold: f64,
    limit: Option<usize>,
) -> Vec<Match> {
    let mut matches: Vec<Match> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| Match {
            index,
            score: similarity(query, candidate),
        })
        .filter(|m| m.score >= threshold)
        .collect();

    // Stable sort keeps insertion order within equal scores.
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    if let Some(limit) = limit {
        matches.truncate(limit);
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_basics() {
        assert_eq!(distance("kitten", "sitting"), 3);
        assert_eq!(distance("flaw", "lawn"), 2);
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("same", "same"), 0);
    }

    #[test]
    fn test_distance_is_case_and_space_insensitive() {
        assert_eq!(distance("  Living Room ", "living room"), 0);
    }

    #[test]
    fn test_similarity_bounds() {
        let pairs = [
            ("Living Room Light", "Livng Room Light"),
            ("a", "completely different"),
            ("x", "x"),
        ];
        for (a, b) in pairs {
            let s = similarity(a, b);
            assert!((0.0..=1.0).contains(&s), "{a} vs {b} scored {s}");
            assert_eq!(s, similarity(b, a), "symmetry broken for {a} vs {b}");
        }
        assert_eq!(similarity("anything", "anything"), 1.0);
    }

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(similarity("", "light"), 0.0);
        assert_eq!(similarity("light", "   "), 0.0);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn test_typo_scores_high() {
        // One dropped letter out of seventeen.
        let s = similarity("Livng Room Light", "Living Room Light");
        assert!(s > 0.9, "scored {s}");
    }

    #[test]
    fn test_best_match_strictly_above_threshold() {
        let candidates = ["living room light", "bedroom lamp", "kitchen light"];
        let m = best_match("livng room light", &candidates, 0.6).unwrap();
        assert_eq!(m.index, 0);

        // An exact-threshold score is not a match.
        assert!(best_match("ab", &["abcd"], 0.5).is_none());
    }

    #[test]
    fn test_best_match_tie_goes_to_earlier() {
        // Both candidates are one edit away from the query.
        let m = best_match("lamp", &["lamb", "lame"], 0.5).unwrap();
        assert_eq!(m.index, 0);
    }

    #[test]
    fn test_top_matches_sorted_and_limited() {
        let candidates = ["kitchen light", "kitchen lights", "garage door"];
        let top = top_matches("kitchen light", &candidates, 0.6, None);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].index, 0);
        assert!(top[0].score >= top[1].score);

        let top = top_matches("kitchen light", &candidates, 0.6, Some(1));
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn test_top_matches_threshold_is_inclusive() {
        // similarity("ab", "abcd") == 0.5 exactly.
        let top = top_matches("ab", &["abcd"], 0.5, None);
        assert_eq!(top.len(), 1);
    }
}
