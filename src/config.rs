//! Agent configuration
//!
//! Every knob is optional and defaulted; out-of-range values are clamped
//! rather than rejected.

use serde::{Deserialize, Serialize};

use crate::session::TrackerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Run candidate questions through the rephrasing hook
    pub rephrasing_enabled: bool,
    /// Risk detector sensitivity, clamped to [0,1]
    pub risk_sensitivity: f64,
    /// Minimum pattern-match confidence, clamped to [0,1]
    pub pattern_min_confidence: f64,
    /// Minimum seconds between snapshot pipeline runs
    pub suggestion_interval_sec: i64,
    pub max_active_suggestions: usize,
    pub crisis_detection_enabled: bool,
    /// Extra phrases treated as crisis keywords
    pub custom_crisis_keywords: Vec<String>,
    pub tracker: TrackerConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            rephrasing_enabled: false,
            risk_sensitivity: 0.8,
            pattern_min_confidence: 0.4,
            suggestion_interval_sec: 5,
            max_active_suggestions: 5,
            crisis_detection_enabled: true,
            custom_crisis_keywords: Vec::new(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Clamp the bounded fields into range.
    pub fn normalized(mut self) -> Self {
        self.risk_sensitivity = self.risk_sensitivity.clamp(0.0, 1.0);
        self.pattern_min_confidence = self.pattern_min_confidence.clamp(0.0, 1.0);
        self.suggestion_interval_sec = self.suggestion_interval_sec.max(0);
        self
    }

    pub fn with_risk_sensitivity(mut self, sensitivity: f64) -> Self {
        self.risk_sensitivity = sensitivity;
        self
    }

    pub fn with_pattern_min_confidence(mut self, min_confidence: f64) -> Self {
        self.pattern_min_confidence = min_confidence;
        self
    }

    pub fn with_suggestion_interval_sec(mut self, interval: i64) -> Self {
        self.suggestion_interval_sec = interval;
        self
    }

    pub fn with_crisis_keywords(mut self, keywords: Vec<String>) -> Self {
        self.custom_crisis_keywords = keywords;
        self
    }
}
