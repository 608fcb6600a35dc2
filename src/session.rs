//! Session tracking
//!
//! Stateful bookkeeping scoped to one session: topic coverage, the emotional
//! timeline, risk and suggestion ledgers, derived metrics, and the final
//! session report. All mutation goes through the tracker; the state is
//! replaced wholesale on reset and frozen on end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{pattern_topic_alias, Importance, TopicCatalog, TopicDefinition};
use crate::types::{
    EmotionLabel, EmotionSample, EmotionScores, PatternMatch, RiskIndicator, RiskIndicatorKind,
    RiskLevel, Suggestion, Trajectory,
};

/// Tunable tracker behavior. All values defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Keyword hits required before a topic counts as discussed
    pub min_keyword_hits: usize,
    /// Seconds credited per discussion of a topic
    pub topic_time_increment_sec: i64,
    /// Cumulative seconds after which depth upgrades to moderate.
    ///
    /// Time is credited once, when a topic first becomes covered, so with
    /// the default 30 s increment a topic stays at the surface tier; the
    /// upper tiers only engage when `topic_time_increment_sec` is raised
    /// past these thresholds.
    pub moderate_depth_sec: i64,
    /// Cumulative seconds after which depth upgrades to deep
    pub deep_depth_sec: i64,
    /// Placeholder congruence value; no transcript-emotion cross-check is
    /// implemented, so this is a configurable constant by design
    pub congruence_placeholder: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_keyword_hits: 2,
            topic_time_increment_sec: 30,
            moderate_depth_sec: 60,
            deep_depth_sec: 120,
            congruence_placeholder: 0.5,
        }
    }
}

/// How deeply a topic has been explored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthTier {
    Surface,
    Moderate,
    Deep,
}

/// Per-session coverage record for one catalog topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCoverage {
    pub topic_id: String,
    pub covered: bool,
    /// Cumulative estimated discussion time (seconds)
    pub time_spent_sec: i64,
    /// Emotions observed while the topic was being discussed
    pub emotions: Vec<EmotionLabel>,
    pub depth: DepthTier,
    pub discussed_at: Vec<DateTime<Utc>>,
}

impl TopicCoverage {
    fn new(topic_id: &str) -> Self {
        Self {
            topic_id: topic_id.to_string(),
            covered: false,
            time_spent_sec: 0,
            emotions: Vec::new(),
            depth: DepthTier::Surface,
            discussed_at: Vec::new(),
        }
    }
}

/// Aggregate state owned by the tracker for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub coverage: Vec<TopicCoverage>,
    /// Time-ordered emotion samples
    pub timeline: Vec<EmotionSample>,
    /// Append-only risk event log
    pub risk_events: Vec<RiskIndicator>,
    /// Every suggestion ever issued this session
    pub suggestions: Vec<Suggestion>,
    pub active_patterns: Vec<PatternMatch>,
    pub duration_sec: i64,
    pub active: bool,
}

impl SessionState {
    fn new(session_id: String, started_at: DateTime<Utc>, catalog: &TopicCatalog) -> Self {
        Self {
            session_id,
            started_at,
            coverage: catalog.iter().map(|t| TopicCoverage::new(&t.id)).collect(),
            timeline: Vec::new(),
            risk_events: Vec::new(),
            suggestions: Vec::new(),
            active_patterns: Vec::new(),
            duration_sec: 0,
            active: true,
        }
    }
}

/// Normalized view of the emotional timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalSummary {
    /// Normalized label distribution over the full timeline
    pub distribution: EmotionScores,
    pub dominant: EmotionLabel,
    /// 1 minus the label-change rate (0-1)
    pub stability: f64,
    pub trajectory: Trajectory,
}

/// Derived at-a-glance metrics for the clinician view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapistMetrics {
    /// Weighted affect balance, roughly -1 (all sad) to 1 (all happy)
    pub emotional_balance: f64,
    /// 0-1 composite of arousal and instability
    pub stress_indicator: f64,
    /// Mean sample confidence over the timeline
    pub engagement_level: f64,
    /// Fixed placeholder; see [`TrackerConfig::congruence_placeholder`]
    pub congruence_score: f64,
    pub risk_level: RiskLevel,
}

/// End-of-session bundle handed to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub duration_sec: i64,
    pub covered_topic_count: usize,
    pub uncovered_topic_count: usize,
    pub dominant_emotion: EmotionLabel,
    pub stability: f64,
    pub risk_event_count: usize,
    pub highest_risk: RiskLevel,
    pub suggestions_generated: usize,
    pub suggestions_used: usize,
    pub active_patterns: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Stateful tracker scoped to one session.
pub struct SessionTracker {
    config: TrackerConfig,
    catalog: TopicCatalog,
    state: SessionState,
}

impl SessionTracker {
    pub fn new(
        catalog: TopicCatalog,
        config: TrackerConfig,
        session_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let state = SessionState::new(id, now, &catalog);
        Self {
            config,
            catalog,
            state,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn duration_sec(&self) -> i64 {
        self.state.duration_sec
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Append a sample to the emotional timeline and refresh the duration.
    pub fn record_sample(&mut self, sample: EmotionSample) {
        self.state.duration_sec = (sample.timestamp - self.state.started_at).num_seconds().max(0);
        self.state.timeline.push(sample);
    }

    /// Scan transcript text for catalog topics.
    ///
    /// A topic counts as discussed when at least `min_keyword_hits` of its
    /// keywords appear (case-insensitive substring match). Coverage state is
    /// only mutated the first time a topic is discussed; already-covered
    /// topics are reported back but otherwise skipped, so repeated identical
    /// scans never double-count time.
    ///
    /// Returns the ids of topics mentioned in this call.
    pub fn scan_transcript(
        &mut self,
        text: &str,
        current_emotion: Option<EmotionLabel>,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut mentioned = Vec::new();

        for topic in self.catalog.iter() {
            let hits = topic
                .keywords
                .iter()
                .filter(|kw| lower.contains(kw.to_lowercase().as_str()))
                .count();
            if hits < self.config.min_keyword_hits {
                continue;
            }
            mentioned.push(topic.id.clone());

            let coverage = match self
                .state
                .coverage
                .iter_mut()
                .find(|c| c.topic_id == topic.id)
            {
                Some(c) if !c.covered => c,
                _ => continue,
            };

            coverage.covered = true;
            coverage.discussed_at.push(now);
            coverage.time_spent_sec += self.config.topic_time_increment_sec;
            if let Some(emotion) = current_emotion {
                if !coverage.emotions.contains(&emotion) {
                    coverage.emotions.push(emotion);
                }
            }
            coverage.depth = depth_for(coverage.time_spent_sec, &self.config);
        }

        mentioned
    }

    /// Pick the next topic worth raising.
    ///
    /// Prefers an uncovered topic linked (via the alias table) to an active
    /// pattern's question topics; otherwise the uncovered topic with the
    /// highest importance tier, first match wins. None when everything is
    /// covered.
    pub fn suggest_next_topic(&self, active_patterns: &[PatternMatch]) -> Option<TopicDefinition> {
        let uncovered: Vec<&TopicDefinition> = self
            .catalog
            .iter()
            .filter(|t| {
                self.state
                    .coverage
                    .iter()
                    .any(|c| c.topic_id == t.id && !c.covered)
            })
            .collect();

        if uncovered.is_empty() {
            return None;
        }

        for topic in &uncovered {
            let alias = pattern_topic_alias(&topic.id);
            let linked = active_patterns
                .iter()
                .any(|m| m.pattern.question_topics.iter().any(|qt| qt == alias));
            if linked {
                return Some((*topic).clone());
            }
        }

        for tier in [Importance::High, Importance::Medium, Importance::Low] {
            if let Some(topic) = uncovered.iter().find(|t| t.importance == tier) {
                return Some((*topic).clone());
            }
        }
        None
    }

    /// Ids of topics discussed within `window_sec` of `now`.
    pub fn recently_discussed(&self, now: DateTime<Utc>, window_sec: i64) -> Vec<String> {
        self.state
            .coverage
            .iter()
            .filter(|c| {
                c.discussed_at
                    .iter()
                    .any(|t| (now - *t).num_seconds() <= window_sec)
            })
            .map(|c| c.topic_id.clone())
            .collect()
    }

    /// Append risk indicators to the session risk log.
    pub fn record_risk_indicators(&mut self, indicators: &[RiskIndicator]) {
        self.state.risk_events.extend_from_slice(indicators);
    }

    /// Merge matches into the active-pattern set, replacing stale entries for
    /// the same pattern. Returns the ids of patterns that are newly active.
    pub fn record_pattern_matches(&mut self, matches: &[PatternMatch]) -> Vec<String> {
        let mut newly_active = Vec::new();
        for m in matches {
            match self
                .state
                .active_patterns
                .iter_mut()
                .find(|p| p.pattern.id == m.pattern.id)
            {
                Some(existing) => *existing = m.clone(),
                None => {
                    newly_active.push(m.pattern.id.clone());
                    self.state.active_patterns.push(m.clone());
                }
            }
        }
        newly_active
    }

    pub fn active_patterns(&self) -> &[PatternMatch] {
        &self.state.active_patterns
    }

    /// Append a suggestion to the session ledger.
    pub fn record_suggestion(&mut self, suggestion: Suggestion) {
        self.state.suggestions.push(suggestion);
    }

    /// Flag a ledger suggestion as used. Returns false when the id is unknown.
    pub fn mark_used(&mut self, id: u64) -> bool {
        match self.state.suggestions.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                s.used = true;
                true
            }
            None => false,
        }
    }

    /// Flag a ledger suggestion as dismissed. Returns false when the id is
    /// unknown.
    pub fn mark_dismissed(&mut self, id: u64) -> bool {
        match self.state.suggestions.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                s.dismissed = true;
                true
            }
            None => false,
        }
    }

    /// Highest severity implied by any logged risk event; low when empty.
    pub fn highest_risk_level(&self) -> RiskLevel {
        self.state
            .risk_events
            .iter()
            .map(|e| match e.kind {
                RiskIndicatorKind::SuicidalIdeation => RiskLevel::Crisis,
                RiskIndicatorKind::SelfHarm | RiskIndicatorKind::Crisis => RiskLevel::High,
                RiskIndicatorKind::SevereDistress => RiskLevel::Moderate,
                RiskIndicatorKind::Dissociation => RiskLevel::Low,
            })
            .max()
            .unwrap_or(RiskLevel::Low)
    }

    /// Summarize the emotional timeline.
    pub fn emotional_summary(&self) -> EmotionalSummary {
        let timeline = &self.state.timeline;
        let n = timeline.len();

        let mut distribution = EmotionScores::default();
        for sample in timeline {
            let current = distribution.get(sample.dominant);
            distribution.set(sample.dominant, current + 1.0);
        }
        if n > 0 {
            for label in EmotionLabel::ALL {
                distribution.set(label, distribution.get(label) / n as f64);
            }
        }

        // Ties favor the ALL iteration order; empty timelines are neutral.
        let mut dominant = EmotionLabel::Neutral;
        let mut best = 0.0;
        for label in EmotionLabel::ALL {
            if distribution.get(label) > best {
                best = distribution.get(label);
                dominant = label;
            }
        }

        let stability = if n < 2 {
            1.0
        } else {
            let changes = timeline
                .windows(2)
                .filter(|pair| pair[0].dominant != pair[1].dominant)
                .count();
            1.0 - changes as f64 / (n - 1) as f64
        };

        let trajectory = if stability < 0.4 {
            Trajectory::Volatile
        } else {
            let mid = n / 2;
            let happy_count = |slice: &[EmotionSample]| {
                slice
                    .iter()
                    .filter(|s| s.dominant == EmotionLabel::Happy)
                    .count() as i64
            };
            let delta = happy_count(&timeline[mid..]) - happy_count(&timeline[..mid]);
            if delta > 2 {
                Trajectory::Improving
            } else if delta < -2 {
                Trajectory::Declining
            } else {
                Trajectory::Stable
            }
        };

        EmotionalSummary {
            distribution,
            dominant,
            stability,
            trajectory,
        }
    }

    /// Derived metrics for the clinician display.
    pub fn therapist_metrics(&self) -> TherapistMetrics {
        let summary = self.emotional_summary();
        let d = &summary.distribution;

        let emotional_balance = d.happy + 0.3 * d.surprise - d.sad;
        let stress_indicator = (0.5 * d.surprise + 0.5 * (1.0 - summary.stability)).min(1.0);
        let engagement_level = if self.state.timeline.is_empty() {
            0.5
        } else {
            self.state.timeline.iter().map(|s| s.confidence).sum::<f64>()
                / self.state.timeline.len() as f64
        };

        TherapistMetrics {
            emotional_balance,
            stress_indicator,
            engagement_level,
            congruence_score: self.config.congruence_placeholder,
            risk_level: self.highest_risk_level(),
        }
    }

    /// Bundle the session summary, active patterns, and recommendations.
    pub fn session_report(&self) -> SessionReport {
        let summary = self.emotional_summary();
        let covered = self.state.coverage.iter().filter(|c| c.covered).count();
        let uncovered = self.state.coverage.len() - covered;

        let mut recommendations = Vec::new();

        let missed_high: Vec<&str> = self
            .catalog
            .iter()
            .filter(|t| t.importance == Importance::High)
            .filter(|t| {
                self.state
                    .coverage
                    .iter()
                    .any(|c| c.topic_id == t.id && !c.covered)
            })
            .map(|t| t.name.as_str())
            .collect();
        if !missed_high.is_empty() {
            recommendations.push(format!(
                "Important topics not yet raised: {}",
                missed_high.join(", ")
            ));
        }

        if summary.trajectory == Trajectory::Declining {
            recommendations.push(
                "Emotional trajectory is declining; monitor closely and revisit safety planning"
                    .to_string(),
            );
        }
        if summary.stability < 0.4 {
            recommendations
                .push("High emotional volatility observed; grounding exercises may help".to_string());
        }
        if !self.state.risk_events.is_empty() {
            recommendations
                .push("Risk indicators were raised; review the safety plan before closing".to_string());
        }
        if !self.state.active_patterns.is_empty() {
            let names: Vec<&str> = self
                .state
                .active_patterns
                .iter()
                .map(|p| p.pattern.name.as_str())
                .collect();
            recommendations.push(format!("Follow up on indicators consistent with: {}", names.join(", ")));
        }

        SessionReport {
            session_id: self.state.session_id.clone(),
            duration_sec: self.state.duration_sec,
            covered_topic_count: covered,
            uncovered_topic_count: uncovered,
            dominant_emotion: summary.dominant,
            stability: summary.stability,
            risk_event_count: self.state.risk_events.len(),
            highest_risk: self.highest_risk_level(),
            suggestions_generated: self.state.suggestions.len(),
            suggestions_used: self.state.suggestions.iter().filter(|s| s.used).count(),
            active_patterns: self
                .state
                .active_patterns
                .iter()
                .map(|p| p.pattern.name.clone())
                .collect(),
            recommendations,
        }
    }

    /// Replace the session state wholesale.
    pub fn reset(&mut self, new_id: Option<String>, now: DateTime<Utc>) {
        let id = new_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.state = SessionState::new(id, now, &self.catalog);
    }

    /// Freeze the duration, deactivate, and return the final report.
    pub fn end(&mut self, now: DateTime<Utc>) -> SessionReport {
        self.state.duration_sec = (now - self.state.started_at).num_seconds().max(0);
        self.state.active = false;
        self.session_report()
    }
}

fn depth_for(time_spent_sec: i64, config: &TrackerConfig) -> DepthTier {
    if time_spent_sec >= config.deep_depth_sec {
        DepthTier::Deep
    } else if time_spent_sec >= config.moderate_depth_sec {
        DepthTier::Moderate
    } else {
        DepthTier::Surface
    }
}
