//! Pattern matching
//!
//! Scores the rolling emotion history against the clinical pattern catalog.
//! Matching is a pure function of its inputs plus the static catalog:
//! a recency-weighted score distribution is compared against each pattern's
//! expected profile, and marker heuristics contribute the rest.

use chrono::{DateTime, Utc};

use crate::catalog::PatternCatalog;
use crate::markers::detect_markers;
use crate::types::{EmotionLabel, EmotionSample, EmotionScores, PatternMatch};

/// Minimum history length before matching produces anything.
pub const MIN_MATCH_HISTORY: usize = 5;

/// Per-sample recency decay applied when averaging score vectors.
const RECENCY_DECAY: f64 = 0.9;

/// Weight of profile similarity in the combined confidence.
const SIMILARITY_WEIGHT: f64 = 0.6;

/// Weight of the marker ratio in the combined confidence.
const MARKER_WEIGHT: f64 = 0.4;

/// Matcher over a fixed pattern catalog.
pub struct PatternMatcher {
    catalog: PatternCatalog,
}

impl PatternMatcher {
    pub fn new(catalog: PatternCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    /// Score `history` against every catalog pattern.
    ///
    /// Returns matches with combined confidence at or above `min_confidence`,
    /// sorted by confidence descending (stable on ties). Histories shorter
    /// than [`MIN_MATCH_HISTORY`] yield an empty list.
    pub fn match_patterns(
        &self,
        history: &[EmotionSample],
        min_confidence: f64,
        session_elapsed_sec: i64,
    ) -> Vec<PatternMatch> {
        if history.len() < MIN_MATCH_HISTORY {
            return Vec::new();
        }

        let distribution = recency_weighted_distribution(history);
        let detected = detect_markers(history);
        let timestamp = history
            .last()
            .map(|s| s.timestamp)
            .unwrap_or_else(Utc::now);

        let mut matches: Vec<PatternMatch> = Vec::new();
        for pattern in self.catalog.iter() {
            let similarity = cosine_similarity(&distribution, &pattern.expected_profile);

            let declared = pattern.markers.len();
            let hit: Vec<_> = pattern
                .markers
                .iter()
                .copied()
                .filter(|m| detected.contains(m))
                .collect();
            let marker_ratio = if declared == 0 {
                0.0
            } else {
                hit.len() as f64 / declared as f64
            };

            let confidence =
                (SIMILARITY_WEIGHT * similarity + MARKER_WEIGHT * marker_ratio).clamp(0.0, 1.0);

            if confidence >= min_confidence {
                matches.push(PatternMatch {
                    pattern: pattern.clone(),
                    confidence,
                    detected_markers: hit,
                    timestamp,
                    session_elapsed_sec,
                });
            }
        }

        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches
    }
}

/// Average the per-sample score vectors with exponential recency weighting.
///
/// Each sample is weighted by `0.9^(age in samples)`; weights are normalized
/// to sum to 1 before averaging.
pub fn recency_weighted_distribution(history: &[EmotionSample]) -> EmotionScores {
    let n = history.len();
    if n == 0 {
        return EmotionScores::default();
    }

    let mut accumulated = EmotionScores::default();
    let mut total_weight = 0.0;

    for (i, sample) in history.iter().enumerate() {
        let age = (n - 1 - i) as f64;
        let weight = RECENCY_DECAY.powf(age);
        for label in EmotionLabel::ALL {
            let value = accumulated.get(label) + sample.scores.get(label) * weight;
            accumulated.set(label, value);
        }
        total_weight += weight;
    }

    for label in EmotionLabel::ALL {
        accumulated.set(label, accumulated.get(label) / total_weight);
    }
    accumulated
}

/// Cosine similarity between two score vectors; 0 if either has zero
/// magnitude.
pub fn cosine_similarity(a: &EmotionScores, b: &EmotionScores) -> f64 {
    let mag_a = a.magnitude();
    let mag_b = b.magnitude();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    let dot: f64 = a
        .as_array()
        .iter()
        .zip(b.as_array().iter())
        .map(|(x, y)| x * y)
        .sum();
    dot / (mag_a * mag_b)
}
