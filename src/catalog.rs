//! Static clinical catalogs
//!
//! Patterns, topics, and the topic-alias table are immutable data loaded once
//! at startup and passed by reference into the components that need them.
//! Deployments can replace the built-in catalogs with JSON-loaded ones.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::EmotionScores;

/// A named heuristic boolean detected over a window of recent samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehavioralMarker {
    /// Dominant-sad ratio above 0.5 in the recent window
    PersistentSadness,
    /// Dominant-neutral ratio above 0.6
    FlatAffect,
    /// Label alternation rate above 0.6
    RapidShifts,
    /// Three or more high-confidence surprise samples in the last ten
    SurpriseSpikes,
    /// An adjacent happy/sad transition with both labels present
    MoodSwings,
    /// Two or more distinct contiguous sad runs
    SadnessWaves,
    /// Four of the last five samples sad at high confidence
    HopelessnessSpike,
    /// Mean confidence below 0.4 over the last ten samples
    Withdrawal,
}

impl BehavioralMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehavioralMarker::PersistentSadness => "persistent sadness",
            BehavioralMarker::FlatAffect => "flat affect",
            BehavioralMarker::RapidShifts => "rapid emotional shifts",
            BehavioralMarker::SurpriseSpikes => "startle spikes",
            BehavioralMarker::MoodSwings => "mood swings",
            BehavioralMarker::SadnessWaves => "recurring sadness waves",
            BehavioralMarker::HopelessnessSpike => "hopelessness spike",
            BehavioralMarker::Withdrawal => "withdrawal",
        }
    }
}

/// A static clinical profile used only for suggesting discussion topics,
/// never for diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalPattern {
    pub id: String,
    /// Display name shown to the clinician
    pub name: String,
    /// Behavioral markers this pattern declares
    pub markers: Vec<BehavioralMarker>,
    /// Expected emotion score distribution
    pub expected_profile: EmotionScores,
    /// Weight of this pattern toward risk (0-1)
    pub risk_weight: f64,
    /// Question topics associated with this pattern
    pub question_topics: Vec<String>,
}

/// Importance tier of a discussion topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
}

/// A static topic the session tracker watches for in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDefinition {
    pub id: String,
    pub name: String,
    /// Case-insensitive substrings that count as mentions
    pub keywords: Vec<String>,
    pub importance: Importance,
    pub category: String,
}

/// Immutable catalog of clinical patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCatalog {
    patterns: Vec<ClinicalPattern>,
}

impl PatternCatalog {
    pub fn new(patterns: Vec<ClinicalPattern>) -> Result<Self, EngineError> {
        let catalog = Self { patterns };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from JSON, validating bounds.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.patterns.is_empty() {
            return Err(EngineError::InvalidCatalog(
                "pattern catalog is empty".to_string(),
            ));
        }
        for pattern in &self.patterns {
            if !(0.0..=1.0).contains(&pattern.risk_weight) {
                return Err(EngineError::InvalidCatalog(format!(
                    "pattern '{}' has risk weight outside [0,1]",
                    pattern.id
                )));
            }
            if pattern.markers.is_empty() {
                return Err(EngineError::InvalidCatalog(format!(
                    "pattern '{}' declares no markers",
                    pattern.id
                )));
            }
            if pattern.expected_profile.magnitude() == 0.0 {
                return Err(EngineError::InvalidCatalog(format!(
                    "pattern '{}' has a zero expected profile",
                    pattern.id
                )));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClinicalPattern> {
        self.patterns.iter()
    }

    pub fn get(&self, id: &str) -> Option<&ClinicalPattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
        }
    }
}

/// Immutable catalog of discussion topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCatalog {
    topics: Vec<TopicDefinition>,
}

impl TopicCatalog {
    pub fn new(topics: Vec<TopicDefinition>) -> Result<Self, EngineError> {
        let catalog = Self { topics };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.topics.is_empty() {
            return Err(EngineError::InvalidCatalog(
                "topic catalog is empty".to_string(),
            ));
        }
        for topic in &self.topics {
            if topic.keywords.is_empty() {
                return Err(EngineError::InvalidCatalog(format!(
                    "topic '{}' has no keywords",
                    topic.id
                )));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicDefinition> {
        self.topics.iter()
    }

    pub fn get(&self, id: &str) -> Option<&TopicDefinition> {
        self.topics.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl Default for TopicCatalog {
    fn default() -> Self {
        Self {
            topics: default_topics(),
        }
    }
}

/// Translate a tracker topic id into the vocabulary used by pattern
/// question-topic lists. A replaceable configuration table; unknown ids map
/// to themselves.
pub fn pattern_topic_alias(topic_id: &str) -> &str {
    match topic_id {
        "suicidal_thoughts" => "safety",
        "work_stress" => "stress",
        "trauma_history" => "trauma",
        "social_support" => "support",
        "relationships" => "connection",
        other => other,
    }
}

fn profile(happy: f64, sad: f64, surprise: f64, neutral: f64) -> EmotionScores {
    EmotionScores {
        happy,
        sad,
        surprise,
        neutral,
    }
}

fn default_patterns() -> Vec<ClinicalPattern> {
    vec![
        ClinicalPattern {
            id: "depressive".to_string(),
            name: "Depressive Indicators".to_string(),
            markers: vec![
                BehavioralMarker::PersistentSadness,
                BehavioralMarker::HopelessnessSpike,
                BehavioralMarker::FlatAffect,
                BehavioralMarker::SadnessWaves,
            ],
            expected_profile: profile(0.05, 0.60, 0.05, 0.30),
            risk_weight: 0.8,
            question_topics: vec![
                "mood".to_string(),
                "sleep".to_string(),
                "energy".to_string(),
                "safety".to_string(),
            ],
        },
        ClinicalPattern {
            id: "anxiety".to_string(),
            name: "Anxiety Indicators".to_string(),
            markers: vec![
                BehavioralMarker::RapidShifts,
                BehavioralMarker::SurpriseSpikes,
            ],
            expected_profile: profile(0.10, 0.25, 0.40, 0.25),
            risk_weight: 0.6,
            question_topics: vec![
                "stress".to_string(),
                "sleep".to_string(),
                "coping".to_string(),
            ],
        },
        ClinicalPattern {
            id: "mood_instability".to_string(),
            name: "Mood Instability".to_string(),
            markers: vec![
                BehavioralMarker::MoodSwings,
                BehavioralMarker::RapidShifts,
                BehavioralMarker::SadnessWaves,
            ],
            expected_profile: profile(0.30, 0.35, 0.20, 0.15),
            risk_weight: 0.7,
            question_topics: vec![
                "mood".to_string(),
                "sleep".to_string(),
                "connection".to_string(),
            ],
        },
        ClinicalPattern {
            id: "trauma_response".to_string(),
            name: "Trauma Response Indicators".to_string(),
            markers: vec![
                BehavioralMarker::SurpriseSpikes,
                BehavioralMarker::Withdrawal,
                BehavioralMarker::RapidShifts,
            ],
            expected_profile: profile(0.05, 0.30, 0.35, 0.30),
            risk_weight: 0.75,
            question_topics: vec![
                "trauma".to_string(),
                "sleep".to_string(),
                "coping".to_string(),
            ],
        },
        ClinicalPattern {
            id: "emotional_withdrawal".to_string(),
            name: "Emotional Withdrawal".to_string(),
            markers: vec![BehavioralMarker::FlatAffect, BehavioralMarker::Withdrawal],
            expected_profile: profile(0.05, 0.15, 0.05, 0.75),
            risk_weight: 0.65,
            question_topics: vec![
                "connection".to_string(),
                "support".to_string(),
                "self_esteem".to_string(),
            ],
        },
    ]
}

fn topic(
    id: &str,
    name: &str,
    keywords: &[&str],
    importance: Importance,
    category: &str,
) -> TopicDefinition {
    TopicDefinition {
        id: id.to_string(),
        name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        importance,
        category: category.to_string(),
    }
}

fn default_topics() -> Vec<TopicDefinition> {
    vec![
        topic(
            "mood",
            "Mood",
            &["mood", "feeling", "feelings", "emotion", "down", "low lately"],
            Importance::High,
            "emotional",
        ),
        topic(
            "sleep",
            "Sleep",
            &["sleep", "insomnia", "tired", "nightmare", "awake at night", "rest"],
            Importance::High,
            "somatic",
        ),
        topic(
            "suicidal_thoughts",
            "Suicidal Thoughts",
            &["suicide", "die", "death", "end it", "hurt myself", "self harm"],
            Importance::High,
            "safety",
        ),
        topic(
            "trauma_history",
            "Trauma History",
            &["trauma", "abuse", "flashback", "assault", "accident"],
            Importance::High,
            "history",
        ),
        topic(
            "substance_use",
            "Substance Use",
            &["drink", "drinking", "alcohol", "drugs", "pills", "high"],
            Importance::High,
            "safety",
        ),
        topic(
            "relationships",
            "Relationships",
            &["relationship", "partner", "family", "friend", "alone", "lonely"],
            Importance::Medium,
            "social",
        ),
        topic(
            "work_stress",
            "Work Stress",
            &["work", "job", "boss", "deadline", "pressure", "career"],
            Importance::Medium,
            "stressors",
        ),
        topic(
            "self_esteem",
            "Self-Esteem",
            &["worthless", "failure", "not good enough", "hate myself", "confidence"],
            Importance::Medium,
            "cognitive",
        ),
        topic(
            "coping",
            "Coping Strategies",
            &["cope", "coping", "manage", "handle", "breathing", "strategy"],
            Importance::Medium,
            "skills",
        ),
        topic(
            "social_support",
            "Social Support",
            &["support", "help me", "there for me", "talk to", "friends"],
            Importance::Medium,
            "social",
        ),
        topic(
            "energy",
            "Energy Levels",
            &["energy", "exhausted", "fatigue", "drained", "motivation"],
            Importance::Low,
            "somatic",
        ),
        topic(
            "appetite",
            "Appetite",
            &["appetite", "eating", "food", "weight", "meals"],
            Importance::Low,
            "somatic",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalogs_are_valid() {
        let patterns = PatternCatalog::default();
        assert!(patterns.validate().is_ok());
        assert!(patterns.get("depressive").is_some());

        let topics = TopicCatalog::default();
        assert!(topics.validate().is_ok());
        assert!(topics.get("suicidal_thoughts").is_some());
    }

    #[test]
    fn test_pattern_catalog_json_round_trip() {
        let catalog = PatternCatalog::default();
        let json = catalog.to_json().unwrap();
        let loaded = PatternCatalog::from_json(&json).unwrap();

        assert_eq!(loaded.len(), catalog.len());
        assert_eq!(
            loaded.get("anxiety").unwrap().risk_weight,
            catalog.get("anxiety").unwrap().risk_weight
        );
    }

    #[test]
    fn test_invalid_risk_weight_rejected() {
        let mut patterns = default_patterns();
        patterns[0].risk_weight = 1.5;

        let result = PatternCatalog::new(patterns);
        assert!(matches!(result, Err(EngineError::InvalidCatalog(_))));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(PatternCatalog::new(Vec::new()).is_err());
        assert!(TopicCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_topic_alias_table() {
        assert_eq!(pattern_topic_alias("suicidal_thoughts"), "safety");
        assert_eq!(pattern_topic_alias("work_stress"), "stress");
        assert_eq!(pattern_topic_alias("mood"), "mood");
    }

    #[test]
    fn test_pattern_topics_reachable_via_alias() {
        // Every pattern question topic must be reachable from some tracker
        // topic through the alias table, or next-topic preference can never
        // fire for it.
        let patterns = PatternCatalog::default();
        let topics = TopicCatalog::default();

        let reachable: Vec<&str> = topics.iter().map(|t| pattern_topic_alias(&t.id)).collect();
        for pattern in patterns.iter() {
            for qt in &pattern.question_topics {
                assert!(
                    reachable.contains(&qt.as_str()),
                    "question topic '{}' of '{}' unreachable",
                    qt,
                    pattern.id
                );
            }
        }
    }
}
