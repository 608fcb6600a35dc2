//! Behavioral marker heuristics
//!
//! Each marker is a pure boolean heuristic over a window of recent emotion
//! samples. The pattern matcher runs all of them against the trailing window
//! and intersects the result with each pattern's declared marker set.

use crate::catalog::BehavioralMarker;
use crate::types::{EmotionLabel, EmotionSample};

/// Samples inspected by the trailing-window heuristics.
const MARKER_WINDOW: usize = 10;

/// High-confidence threshold for the surprise-spike heuristic.
const SPIKE_CONFIDENCE: f64 = 0.7;

/// Run every marker heuristic against the trailing window of `history`.
pub fn detect_markers(history: &[EmotionSample]) -> Vec<BehavioralMarker> {
    let window = trailing_window(history, MARKER_WINDOW);
    let mut detected = Vec::new();

    if persistent_sadness(window) {
        detected.push(BehavioralMarker::PersistentSadness);
    }
    if flat_affect(window) {
        detected.push(BehavioralMarker::FlatAffect);
    }
    if rapid_shifts(window) {
        detected.push(BehavioralMarker::RapidShifts);
    }
    if surprise_spikes(window) {
        detected.push(BehavioralMarker::SurpriseSpikes);
    }
    if mood_swings(window) {
        detected.push(BehavioralMarker::MoodSwings);
    }
    if sadness_waves(window) {
        detected.push(BehavioralMarker::SadnessWaves);
    }
    if hopelessness_spike(window) {
        detected.push(BehavioralMarker::HopelessnessSpike);
    }
    if withdrawal(window) {
        detected.push(BehavioralMarker::Withdrawal);
    }

    detected
}

/// Last `n` samples of `history`, oldest first.
pub fn trailing_window(history: &[EmotionSample], n: usize) -> &[EmotionSample] {
    let start = history.len().saturating_sub(n);
    &history[start..]
}

/// Fraction of samples whose dominant label equals `label`.
pub fn dominant_ratio(window: &[EmotionSample], label: EmotionLabel) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let count = window.iter().filter(|s| s.dominant == label).count();
    count as f64 / window.len() as f64
}

/// Fraction of adjacent pairs whose dominant label changed.
pub fn alternation_rate(window: &[EmotionSample]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let changes = window
        .windows(2)
        .filter(|pair| pair[0].dominant != pair[1].dominant)
        .count();
    changes as f64 / (window.len() - 1) as f64
}

fn persistent_sadness(window: &[EmotionSample]) -> bool {
    dominant_ratio(window, EmotionLabel::Sad) > 0.5
}

fn flat_affect(window: &[EmotionSample]) -> bool {
    dominant_ratio(window, EmotionLabel::Neutral) > 0.6
}

fn rapid_shifts(window: &[EmotionSample]) -> bool {
    alternation_rate(window) > 0.6
}

fn surprise_spikes(window: &[EmotionSample]) -> bool {
    window
        .iter()
        .filter(|s| s.dominant == EmotionLabel::Surprise && s.confidence > SPIKE_CONFIDENCE)
        .count()
        >= 3
}

fn mood_swings(window: &[EmotionSample]) -> bool {
    let has_happy = window.iter().any(|s| s.dominant == EmotionLabel::Happy);
    let has_sad = window.iter().any(|s| s.dominant == EmotionLabel::Sad);
    if !(has_happy && has_sad) {
        return false;
    }
    window.windows(2).any(|pair| {
        matches!(
            (pair[0].dominant, pair[1].dominant),
            (EmotionLabel::Happy, EmotionLabel::Sad) | (EmotionLabel::Sad, EmotionLabel::Happy)
        )
    })
}

fn sadness_waves(window: &[EmotionSample]) -> bool {
    let mut runs = 0;
    let mut in_run = false;
    for sample in window {
        if sample.dominant == EmotionLabel::Sad {
            if !in_run {
                runs += 1;
                in_run = true;
            }
        } else {
            in_run = false;
        }
    }
    runs >= 2
}

fn hopelessness_spike(window: &[EmotionSample]) -> bool {
    let last5 = trailing_window(window, 5);
    if last5.len() < 5 {
        return false;
    }
    last5
        .iter()
        .filter(|s| s.dominant == EmotionLabel::Sad && s.confidence > 0.8)
        .count()
        >= 4
}

fn withdrawal(window: &[EmotionSample]) -> bool {
    if window.is_empty() {
        return false;
    }
    let mean: f64 = window.iter().map(|s| s.confidence).sum::<f64>() / window.len() as f64;
    mean < 0.4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EmotionScores;
    use chrono::Utc;

    fn sample(dominant: EmotionLabel, confidence: f64) -> EmotionSample {
        let mut scores = EmotionScores::default();
        scores.set(dominant, confidence);
        EmotionSample {
            dominant,
            confidence,
            scores,
            timestamp: Utc::now(),
        }
    }

    fn samples(labels: &[(EmotionLabel, f64)]) -> Vec<EmotionSample> {
        labels.iter().map(|(l, c)| sample(*l, *c)).collect()
    }

    #[test]
    fn test_persistent_sadness() {
        let history = samples(&[
            (EmotionLabel::Sad, 0.8),
            (EmotionLabel::Sad, 0.8),
            (EmotionLabel::Sad, 0.8),
            (EmotionLabel::Neutral, 0.6),
            (EmotionLabel::Sad, 0.8),
        ]);
        let markers = detect_markers(&history);
        assert!(markers.contains(&BehavioralMarker::PersistentSadness));
    }

    #[test]
    fn test_flat_affect_requires_majority_neutral() {
        let mostly_neutral = samples(&[
            (EmotionLabel::Neutral, 0.6),
            (EmotionLabel::Neutral, 0.6),
            (EmotionLabel::Neutral, 0.6),
            (EmotionLabel::Neutral, 0.6),
            (EmotionLabel::Sad, 0.5),
        ]);
        assert!(detect_markers(&mostly_neutral).contains(&BehavioralMarker::FlatAffect));

        let split = samples(&[
            (EmotionLabel::Neutral, 0.6),
            (EmotionLabel::Sad, 0.6),
            (EmotionLabel::Neutral, 0.6),
            (EmotionLabel::Sad, 0.6),
        ]);
        assert!(!detect_markers(&split).contains(&BehavioralMarker::FlatAffect));
    }

    #[test]
    fn test_rapid_shifts_on_full_alternation() {
        let history = samples(&[
            (EmotionLabel::Happy, 0.7),
            (EmotionLabel::Sad, 0.7),
            (EmotionLabel::Happy, 0.7),
            (EmotionLabel::Sad, 0.7),
            (EmotionLabel::Happy, 0.7),
        ]);
        // Alternation rate is 1.0
        assert!((alternation_rate(&history) - 1.0).abs() < f64::EPSILON);
        assert!(detect_markers(&history).contains(&BehavioralMarker::RapidShifts));
    }

    #[test]
    fn test_mood_swings_needs_adjacent_transition() {
        let adjacent = samples(&[
            (EmotionLabel::Happy, 0.7),
            (EmotionLabel::Sad, 0.7),
            (EmotionLabel::Neutral, 0.6),
        ]);
        assert!(detect_markers(&adjacent).contains(&BehavioralMarker::MoodSwings));

        let separated = samples(&[
            (EmotionLabel::Happy, 0.7),
            (EmotionLabel::Neutral, 0.6),
            (EmotionLabel::Sad, 0.7),
        ]);
        assert!(!detect_markers(&separated).contains(&BehavioralMarker::MoodSwings));
    }

    #[test]
    fn test_sadness_waves_counts_distinct_runs() {
        let two_runs = samples(&[
            (EmotionLabel::Sad, 0.7),
            (EmotionLabel::Sad, 0.7),
            (EmotionLabel::Neutral, 0.6),
            (EmotionLabel::Sad, 0.7),
        ]);
        assert!(detect_markers(&two_runs).contains(&BehavioralMarker::SadnessWaves));

        let one_run = samples(&[
            (EmotionLabel::Sad, 0.7),
            (EmotionLabel::Sad, 0.7),
            (EmotionLabel::Sad, 0.7),
            (EmotionLabel::Neutral, 0.6),
        ]);
        assert!(!detect_markers(&one_run).contains(&BehavioralMarker::SadnessWaves));
    }

    #[test]
    fn test_hopelessness_spike() {
        let history = samples(&[
            (EmotionLabel::Sad, 0.9),
            (EmotionLabel::Sad, 0.9),
            (EmotionLabel::Neutral, 0.5),
            (EmotionLabel::Sad, 0.9),
            (EmotionLabel::Sad, 0.9),
        ]);
        // 4 of last 5 are sad with confidence > 0.8
        assert!(detect_markers(&history).contains(&BehavioralMarker::HopelessnessSpike));
    }

    #[test]
    fn test_withdrawal_on_low_mean_confidence() {
        let history = samples(&[
            (EmotionLabel::Neutral, 0.3),
            (EmotionLabel::Neutral, 0.2),
            (EmotionLabel::Sad, 0.35),
            (EmotionLabel::Neutral, 0.3),
        ]);
        assert!(detect_markers(&history).contains(&BehavioralMarker::Withdrawal));
    }

    #[test]
    fn test_heuristics_use_trailing_ten_only() {
        // 10 happy samples followed by 10 sad ones: only the sad tail counts.
        let mut history = samples(&[(EmotionLabel::Happy, 0.9); 10]);
        history.extend(samples(&[(EmotionLabel::Sad, 0.9); 10]));

        let markers = detect_markers(&history);
        assert!(markers.contains(&BehavioralMarker::PersistentSadness));
        assert!(!markers.contains(&BehavioralMarker::MoodSwings));
    }

    #[test]
    fn test_empty_history_detects_nothing() {
        assert!(detect_markers(&[]).is_empty());
    }
}
