//! Scoring functions for candidate matching.
//!
//! This module contains:
//! - Token-set Jaccard similarity
//! - Normalized edit-distance ratio
//! - The blended fuzzy score used by the fuzzy tier
//! - The deterministic ranking order shared by every tier

use rustc_hash::FxHashSet;
use std::cmp::Ordering;

use crate::models::FixSuggestion;

// ============================================================================
// Score Thresholds
// ============================================================================

/// Minimum fuzzy score for a candidate to qualify
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 60;

// ============================================================================
// Weights
// ============================================================================

/// Blend between token overlap and edit distance. Tunable; the defaults are
/// an even split until calibrated against real libraries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyWeights {
    pub jaccard: f64,
    pub edit: f64,
}

impl Default for FuzzyWeights {
    fn default() -> Self {
        Self {
            jaccard: 0.5,
            edit: 0.5,
        }
    }
}

impl FuzzyWeights {
    /// Weights rescaled to sum to 1.0 so scores stay within 0..=100.
    fn normalized(self) -> (f64, f64) {
        let j = self.jaccard.max(0.0);
        let e = self.edit.max(0.0);
        let total = j + e;
        if total <= f64::EPSILON {
            (0.5, 0.5)
        } else {
            (j / total, e / total)
        }
    }
}

// ============================================================================
// Similarity Components
// ============================================================================

/// Jaccard similarity of two token sets (0.0 to 1.0).
pub fn jaccard<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    let set_a: FxHashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let set_b: FxHashSet<&str> = b.iter().map(AsRef::as_ref).collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    intersection as f64 / union as f64
}

/// `1 - levenshtein(a, b) / max(len(a), len(b))`, measured in chars.
pub fn edit_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

// ============================================================================
// Combined Scoring
// ============================================================================

/// Fuzzy score between two normalized names, 0..=100.
///
/// `score(a, a) == 100` for any canonical string.
pub fn fuzzy_score<S: AsRef<str>>(
    tokens_a: &[S],
    canonical_a: &str,
    tokens_b: &[S],
    canonical_b: &str,
    weights: FuzzyWeights,
) -> u8 {
    let (wj, we) = weights.normalized();
    let blended = wj * jaccard(tokens_a, tokens_b) + we * edit_ratio(canonical_a, canonical_b);
    (100.0 * blended).round().clamp(0.0, 100.0) as u8
}

// ============================================================================
// Ranking
// ============================================================================

/// Ranking order: score desc, shorter path, lexicographic path, then id.
pub fn rank_order(a: &FixSuggestion, b: &FixSuggestion) -> Ordering {
    b.similarity_score
        .cmp(&a.similarity_score)
        .then_with(|| {
            a.candidate_path
                .chars()
                .count()
                .cmp(&b.candidate_path.chars().count())
        })
        .then_with(|| a.candidate_path.cmp(&b.candidate_path))
        .then_with(|| a.music_file_id.cmp(&b.music_file_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchTier;
    use crate::normalize::normalize;

    fn score_names(a: &str, b: &str) -> u8 {
        let na = normalize(a);
        let nb = normalize(b);
        fuzzy_score(&na.tokens, &na.canonical, &nb.tokens, &nb.canonical, FuzzyWeights::default())
    }

    fn suggestion(id: i64, path: &str, score: u8) -> FixSuggestion {
        FixSuggestion {
            id: None,
            track_id: 1,
            music_file_id: id,
            candidate_path: path.to_string(),
            tier: MatchTier::Fuzzy,
            similarity_score: score,
            index_version: 1,
            created_at: None,
            applied: false,
        }
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard(&["foo", "bar"], &["bar", "foo"]), 1.0);
        assert_eq!(jaccard(&["foo", "bar"], &["foo", "baz"]), 1.0 / 3.0);
        assert_eq!(jaccard::<&str>(&[], &["foo"]), 0.0);
        // Duplicates do not count twice
        assert_eq!(jaccard(&["la", "la"], &["la"]), 1.0);
    }

    #[test]
    fn test_identical_names_score_100() {
        for name in ["foo bar", "x y z long title", "ab"] {
            let n = normalize(name);
            assert_eq!(
                fuzzy_score(&n.tokens, &n.canonical, &n.tokens, &n.canonical, FuzzyWeights::default()),
                100
            );
        }
    }

    #[test]
    fn test_separator_variants_score_100() {
        assert_eq!(score_names("foo_bar.mp3", "foo-bar.mp3"), 100);
    }

    #[test]
    fn test_formula() {
        // tokens {song, one} vs {song, two}: jaccard 1/3
        // "song one" vs "song two": distance 3 over 8 chars
        let expected = (100.0_f64 * (0.5 / 3.0 + 0.5 * (1.0 - 3.0 / 8.0))).round() as u8;
        assert_eq!(score_names("Song One.mp3", "Song Two.mp3"), expected);
    }

    #[test]
    fn test_score_bounds() {
        let pairs = [
            ("", ""),
            ("", "abc def"),
            ("totally different", "nothing in common"),
            ("a very long file name indeed", "ab"),
        ];
        for (a, b) in pairs {
            let s = score_names(a, b);
            assert!(s <= 100, "{:?} vs {:?} = {}", a, b, s);
        }
    }

    #[test]
    fn test_weights_are_rescaled() {
        let n1 = normalize("alpha beta");
        let n2 = normalize("alpha gamma");
        let heavy = FuzzyWeights { jaccard: 3.0, edit: 1.0 };
        let s = fuzzy_score(&n1.tokens, &n1.canonical, &n2.tokens, &n2.canonical, heavy);
        assert!(s <= 100);
        let zero = FuzzyWeights { jaccard: 0.0, edit: 0.0 };
        let d = fuzzy_score(&n1.tokens, &n1.canonical, &n2.tokens, &n2.canonical, zero);
        let default = fuzzy_score(
            &n1.tokens,
            &n1.canonical,
            &n2.tokens,
            &n2.canonical,
            FuzzyWeights::default(),
        );
        assert_eq!(d, default);
    }

    #[test]
    fn test_rank_order() {
        let mut list = vec![
            suggestion(1, "/long/path/song.mp3", 80),
            suggestion(2, "/b/song.mp3", 90),
            suggestion(3, "/a/song.mp3", 90),
            suggestion(4, "/z/s.mp3", 90),
        ];
        list.sort_by(rank_order);
        let ids: Vec<i64> = list.iter().map(|s| s.music_file_id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }
}
