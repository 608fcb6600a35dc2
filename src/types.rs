//! Core types for the Empathic decision-support engine
//!
//! This module defines the data structures that flow through the engine:
//! emotion samples, pattern matches, risk assessments, and suggestions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{BehavioralMarker, ClinicalPattern};

/// Affect label produced by the external emotion detector.
///
/// The detector collapses the full emotion space into four target labels
/// (negative affects map to sad, high-arousal affects to surprise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    /// All labels, in dominant-tie-break order.
    pub const ALL: [EmotionLabel; 4] = [
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Neutral => "neutral",
        }
    }
}

/// Per-label score vector. Scores are non-negative and sum loosely to 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionScores {
    pub happy: f64,
    pub sad: f64,
    pub surprise: f64,
    pub neutral: f64,
}

impl EmotionScores {
    pub fn get(&self, label: EmotionLabel) -> f64 {
        match label {
            EmotionLabel::Happy => self.happy,
            EmotionLabel::Sad => self.sad,
            EmotionLabel::Surprise => self.surprise,
            EmotionLabel::Neutral => self.neutral,
        }
    }

    pub fn set(&mut self, label: EmotionLabel, value: f64) {
        match label {
            EmotionLabel::Happy => self.happy = value,
            EmotionLabel::Sad => self.sad = value,
            EmotionLabel::Surprise => self.surprise = value,
            EmotionLabel::Neutral => self.neutral = value,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.happy, self.sad, self.surprise, self.neutral]
    }

    /// Euclidean magnitude of the score vector.
    pub fn magnitude(&self) -> f64 {
        self.as_array().iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// One timestamped observation from the external emotion detector.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    /// Dominant affect label
    pub dominant: EmotionLabel,
    /// Detector confidence in the dominant label (0-1)
    pub confidence: f64,
    /// Full per-label score vector
    pub scores: EmotionScores,
    /// When the frame was observed
    pub timestamp: DateTime<Utc>,
}

/// Input snapshot consumed from the external detector, possibly carrying a
/// recent transcript excerpt captured alongside the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionSnapshot {
    pub label: EmotionLabel,
    pub confidence: f64,
    pub scores: EmotionScores,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_excerpt: Option<String>,
}

impl EmotionSnapshot {
    pub fn to_sample(&self) -> EmotionSample {
        EmotionSample {
            dominant: self.label,
            confidence: self.confidence.clamp(0.0, 1.0),
            scores: self.scores,
            timestamp: self.timestamp,
        }
    }
}

/// Who produced a transcript fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    MonitoredParty,
    Other,
}

/// A spoken or typed transcript fragment from the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub text: String,
    pub speaker: Speaker,
    pub timestamp: DateTime<Utc>,
}

/// Result of scoring the emotion history against one clinical pattern.
/// Created fresh on each matching pass; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    /// The matched catalog pattern
    pub pattern: ClinicalPattern,
    /// Combined confidence (0-1)
    pub confidence: f64,
    /// Subset of the pattern's markers that were actually detected
    pub detected_markers: Vec<BehavioralMarker>,
    /// When the match was computed
    pub timestamp: DateTime<Utc>,
    /// Session time elapsed at match time (seconds)
    pub session_elapsed_sec: i64,
}

/// Category of a risk signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskIndicatorKind {
    SuicidalIdeation,
    SelfHarm,
    Crisis,
    SevereDistress,
    Dissociation,
}

/// One detected risk signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskIndicator {
    pub kind: RiskIndicatorKind,
    /// Confidence in the signal (0-1)
    pub confidence: f64,
    /// The phrases or observations that triggered it
    pub triggers: Vec<String>,
    /// Recommended clinician action
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// Coarse safety signal, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Crisis,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Crisis => "crisis",
        }
    }
}

/// Direction of the recent emotional trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trajectory {
    Improving,
    Stable,
    Declining,
    Volatile,
}

impl Trajectory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trajectory::Improving => "improving",
            Trajectory::Stable => "stable",
            Trajectory::Declining => "declining",
            Trajectory::Volatile => "volatile",
        }
    }
}

/// Graded risk assessment. Each call to the detector replaces the previous
/// assessment; only the latest is retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub indicators: Vec<RiskIndicator>,
    /// Aggregate weighted score (0-1)
    pub score: f64,
    pub trajectory: Trajectory,
    /// Deduplicated recommended actions, at most 3
    pub recommended_actions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Variant tag of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Question,
    RiskAlert,
    Pattern,
    TopicGap,
    Insight,
}

/// A single advisory item shown to the clinician.
///
/// The `used` and `dismissed` flags are the only fields mutated after
/// creation, and only through the agent's use/dismiss operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Monotonic id, unique within one agent instance
    pub id: u64,
    pub kind: SuggestionKind,
    pub content: String,
    /// Display priority, 1 (lowest) to 5 (highest)
    pub priority: u8,
    /// Short rationale for why this was suggested
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_emotion: Option<EmotionLabel>,
    pub confidence: f64,
    /// Associated condition name for pattern suggestions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub dismissed: bool,
    pub used: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_get_set() {
        let mut scores = EmotionScores::default();
        scores.set(EmotionLabel::Sad, 0.7);
        scores.set(EmotionLabel::Neutral, 0.3);

        assert_eq!(scores.get(EmotionLabel::Sad), 0.7);
        assert_eq!(scores.get(EmotionLabel::Neutral), 0.3);
        assert_eq!(scores.as_array(), [0.0, 0.7, 0.0, 0.3]);
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Crisis > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Moderate);
        assert!(RiskLevel::Moderate > RiskLevel::Low);
    }

    #[test]
    fn test_snapshot_to_sample_clamps_confidence() {
        let snapshot = EmotionSnapshot {
            label: EmotionLabel::Happy,
            confidence: 1.4,
            scores: EmotionScores {
                happy: 1.0,
                ..Default::default()
            },
            timestamp: Utc::now(),
            transcript_excerpt: None,
        };

        let sample = snapshot.to_sample();
        assert_eq!(sample.confidence, 1.0);
        assert_eq!(sample.dominant, EmotionLabel::Happy);
    }

    #[test]
    fn test_serde_round_trip_labels() {
        let json = serde_json::to_string(&EmotionLabel::Surprise).unwrap();
        assert_eq!(json, "\"surprise\"");

        let level: RiskLevel = serde_json::from_str("\"crisis\"").unwrap();
        assert_eq!(level, RiskLevel::Crisis);
    }
}
