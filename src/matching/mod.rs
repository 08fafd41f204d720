//! Similarity scoring and confidence tiers
//!
//! Two bands: direct title comparison is strict (titles should match almost
//! verbatim), associated/alternate titles are noisier (translations,
//! abbreviations) so a looser band applies. Anything below an unambiguous
//! exact match is routed to review, never auto-confirmed.

use serde::{Deserialize, Serialize};

/// Direct title band: titles must be near-verbatim.
pub const DIRECT_MAX_DISTANCE: usize = 10;
pub const DIRECT_MIN_RATIO: f64 = 0.85;

/// Associated-title band: alternate titles tolerate more drift.
pub const ASSOC_MAX_DISTANCE: usize = 20;
pub const ASSOC_MIN_RATIO: f64 = 0.70;

/// How a match between a series title and a directory was derived.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    /// Title slug equals a directory slug verbatim.
    TitleMatch,
    /// Title is within the strict edit-distance band of a directory.
    TitleSimilar,
    /// An alternate title slugs exactly to a directory.
    AssociatedTitle,
    /// An alternate title is within the loose band of a directory.
    AssociatedTitleSimilar,
    /// No directory matched at all.
    #[default]
    NoMatch,
}

impl MatchConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchConfidence::TitleMatch => "title_match",
            MatchConfidence::TitleSimilar => "title_similar",
            MatchConfidence::AssociatedTitle => "associated_title",
            MatchConfidence::AssociatedTitleSimilar => "associated_title_similar",
            MatchConfidence::NoMatch => "no_match",
        }
    }

    /// Similarity never self-confirms; only an exact title match may.
    pub fn needs_review(&self) -> bool {
        !matches!(self, MatchConfidence::TitleMatch)
    }
}

/// Similarity ratio in [0, 1] based on Levenshtein distance.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Whether two keys fall inside the strict direct-title band.
pub fn within_direct_band(a: &str, b: &str) -> bool {
    strsim::levenshtein(a, b) <= DIRECT_MAX_DISTANCE && similarity_ratio(a, b) >= DIRECT_MIN_RATIO
}

/// Whether two keys fall inside the loose associated-title band.
pub fn within_associated_band(a: &str, b: &str) -> bool {
    strsim::levenshtein(a, b) <= ASSOC_MAX_DISTANCE && similarity_ratio(a, b) >= ASSOC_MIN_RATIO
}

/// Classify a remote title key against a directory key.
pub fn classify_direct(candidate: &str, target: &str) -> MatchConfidence {
    if candidate == target {
        MatchConfidence::TitleMatch
    } else if within_direct_band(candidate, target) {
        MatchConfidence::TitleSimilar
    } else {
        MatchConfidence::NoMatch
    }
}

/// Classify an alternate-title key against a directory key.
pub fn classify_associated(candidate: &str, target: &str) -> MatchConfidence {
    if candidate == target {
        MatchConfidence::AssociatedTitle
    } else if within_associated_band(candidate, target) {
        MatchConfidence::AssociatedTitleSimilar
    } else {
        MatchConfidence::NoMatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_is_title_match() {
        assert_eq!(classify_direct("one-piece", "one-piece"), MatchConfidence::TitleMatch);
    }

    #[test]
    fn test_typo_falls_in_direct_band() {
        // "attck" vs "attack": distance 1, high ratio.
        assert_eq!(
            classify_direct("attack-on-titan", "attck-on-titan"),
            MatchConfidence::TitleSimilar
        );
    }

    #[test]
    fn test_unrelated_is_no_match() {
        assert_eq!(
            classify_direct("one-piece", "berserk"),
            MatchConfidence::NoMatch
        );
        assert_eq!(
            classify_associated("one-piece", "berserk"),
            MatchConfidence::NoMatch
        );
    }

    #[test]
    fn test_associated_band_is_looser() {
        let a = "shingeki-no-kyojin-before-the-fall";
        let b = "shingeki-no-kyojin-b4-the-fall";
        assert!(!within_direct_band(a, b) || within_associated_band(a, b));
        assert_eq!(classify_associated(a, b), MatchConfidence::AssociatedTitleSimilar);
    }

    #[test]
    fn test_direct_band_edges() {
        // Large distance but long strings: ratio can pass while distance fails.
        let long_a = "a".repeat(100);
        let mut long_b = long_a.clone();
        long_b.push_str("bbbbbbbbbbb"); // distance 11 > 10
        assert!(!within_direct_band(&long_a, &long_b));
    }

    #[test]
    fn test_needs_review() {
        assert!(!MatchConfidence::TitleMatch.needs_review());
        assert!(MatchConfidence::TitleSimilar.needs_review());
        assert!(MatchConfidence::AssociatedTitle.needs_review());
        assert!(MatchConfidence::AssociatedTitleSimilar.needs_review());
        assert!(MatchConfidence::NoMatch.needs_review());
    }
}
