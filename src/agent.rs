//! Session agent
//!
//! Orchestrates the full pipeline for one session at a time: each incoming
//! emotion snapshot runs risk detection, pattern matching, question
//! selection, and the topic-gap check in that fixed order, then merges the
//! results into the active-suggestion list and notifies listeners. The agent
//! is the sole writer of the emotion history, the active list, and the
//! suggestion id counter.

use chrono::{DateTime, Utc};

use crate::catalog::{pattern_topic_alias, Importance, PatternCatalog, TopicCatalog};
use crate::config::AgentConfig;
use crate::events::{EventBus, ListenerId, SessionEvent};
use crate::matcher::PatternMatcher;
use crate::questions::{rephrase_or_original, QuestionBank, QuestionContext, Rephraser};
use crate::risk::RiskDetector;
use crate::session::{SessionReport, SessionTracker};
use crate::types::{
    EmotionLabel, EmotionSample, EmotionSnapshot, RiskAssessment, RiskLevel, Speaker, Suggestion,
    SuggestionKind, TranscriptFragment,
};

/// Emotion samples retained in the rolling history.
pub const HISTORY_CAP: usize = 100;

/// History length required before pattern matching runs.
const MIN_PATTERN_HISTORY: usize = 10;

/// Session seconds before topic-gap suggestions start.
const TOPIC_GAP_MIN_DURATION_SEC: i64 = 300;

/// Window used to treat a topic as recently discussed.
const RECENT_TOPIC_WINDOW_SEC: i64 = 120;

/// Pattern matches turned into suggestions per pass.
const PATTERN_SUGGESTION_LIMIT: usize = 2;

/// Candidate questions generated per pass.
const QUESTION_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Idle,
    Active,
    Ended,
}

pub struct SessionAgent {
    config: AgentConfig,
    matcher: PatternMatcher,
    detector: RiskDetector,
    tracker: SessionTracker,
    bank: QuestionBank,
    bus: EventBus,
    rephraser: Option<Box<dyn Rephraser>>,
    history: Vec<EmotionSample>,
    active: Vec<Suggestion>,
    next_suggestion_id: u64,
    last_run: Option<DateTime<Utc>>,
    last_emotion: Option<EmotionLabel>,
    phase: AgentPhase,
}

impl SessionAgent {
    pub fn new(config: AgentConfig, now: DateTime<Utc>) -> Self {
        Self::with_catalogs(config, PatternCatalog::default(), TopicCatalog::default(), now)
    }

    pub fn with_catalogs(
        config: AgentConfig,
        patterns: PatternCatalog,
        topics: TopicCatalog,
        now: DateTime<Utc>,
    ) -> Self {
        let config = config.normalized();
        let mut detector = RiskDetector::new(config.risk_sensitivity);
        detector.add_custom_keywords(config.custom_crisis_keywords.iter().cloned());

        Self {
            matcher: PatternMatcher::new(patterns),
            detector,
            tracker: SessionTracker::new(topics, config.tracker.clone(), None, now),
            bank: QuestionBank::default(),
            bus: EventBus::new(),
            rephraser: None,
            history: Vec::new(),
            active: Vec::new(),
            next_suggestion_id: 0,
            last_run: None,
            last_emotion: None,
            phase: AgentPhase::Idle,
            config,
        }
    }

    pub fn with_rephraser(mut self, rephraser: Box<dyn Rephraser>) -> Self {
        self.rephraser = Some(rephraser);
        self
    }

    pub fn with_question_bank(mut self, bank: QuestionBank) -> Self {
        self.bank = bank;
        self
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn active_suggestions(&self) -> &[Suggestion] {
        &self.active
    }

    pub fn session_duration_sec(&self) -> i64 {
        self.tracker.duration_sec()
    }

    /// Level of the most recent assessment; low before any assessment ran.
    pub fn current_risk_level(&self) -> RiskLevel {
        self.detector
            .last_assessment()
            .map(|a| a.level)
            .unwrap_or(RiskLevel::Low)
    }

    pub fn session_report(&self) -> SessionReport {
        self.tracker.session_report()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + 'static,
    {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Begin a session, replacing any previous session state.
    pub fn start(&mut self, session_id: Option<String>, now: DateTime<Utc>) {
        self.tracker.reset(session_id, now);
        self.history.clear();
        self.active.clear();
        self.last_run = None;
        self.last_emotion = None;
        self.phase = AgentPhase::Active;
        self.bus.emit(&SessionEvent::SessionStarted {
            session_id: self.tracker.state().session_id.clone(),
            timestamp: now,
        });
    }

    /// End the session and return the final report.
    pub fn end(&mut self, now: DateTime<Utc>) -> SessionReport {
        let report = self.tracker.end(now);
        self.phase = AgentPhase::Ended;
        self.bus.emit(&SessionEvent::SessionEnded {
            report: report.clone(),
            timestamp: now,
        });
        report
    }

    /// Run the suggestion pipeline for one emotion snapshot.
    ///
    /// Returns the active-suggestion list, unchanged when the agent is not
    /// active or the call lands inside the throttle interval.
    pub fn handle_snapshot(&mut self, snapshot: &EmotionSnapshot) -> &[Suggestion] {
        if self.phase != AgentPhase::Active {
            return &self.active;
        }
        if let Some(last) = self.last_run {
            if (snapshot.timestamp - last).num_seconds() < self.config.suggestion_interval_sec {
                return &self.active;
            }
        }
        self.last_run = Some(snapshot.timestamp);

        let sample = snapshot.to_sample();
        self.last_emotion = Some(sample.dominant);
        if self.history.len() >= HISTORY_CAP {
            self.history.remove(0);
        }
        self.history.push(sample.clone());
        self.tracker.record_sample(sample.clone());

        let mut fresh: Vec<Suggestion> = Vec::new();

        let assessment = self.detector.assess(
            &self.history,
            snapshot.transcript_excerpt.as_deref(),
            snapshot.timestamp,
        );
        self.tracker.record_risk_indicators(&assessment.indicators);
        if let Some(suggestion) = self.risk_suggestion(&assessment, snapshot.timestamp) {
            fresh.push(suggestion);
        }

        if self.history.len() >= MIN_PATTERN_HISTORY {
            let matches = self.matcher.match_patterns(
                &self.history,
                self.config.pattern_min_confidence,
                self.tracker.duration_sec(),
            );
            let newly_active = self.tracker.record_pattern_matches(&matches);
            for m in matches.iter().filter(|m| newly_active.contains(&m.pattern.id)) {
                self.bus.emit(&SessionEvent::PatternDetected {
                    pattern_id: m.pattern.id.clone(),
                    confidence: m.confidence,
                    timestamp: snapshot.timestamp,
                });
            }

            for m in matches.iter().take(PATTERN_SUGGESTION_LIMIT) {
                let priority = if m.pattern.risk_weight >= 0.7 { 3 } else { 2 };
                let topics: Vec<&str> = m
                    .pattern
                    .question_topics
                    .iter()
                    .take(3)
                    .map(String::as_str)
                    .collect();
                fresh.push(self.new_suggestion(
                    SuggestionKind::Pattern,
                    format!("Indicators consistent with {}", m.pattern.name),
                    priority,
                    format!(
                        "Matched {} at {:.0}% confidence; consider exploring: {}",
                        m.pattern.name,
                        m.confidence * 100.0,
                        topics.join(", ")
                    ),
                    snapshot.timestamp,
                    Some(sample.dominant),
                    m.confidence,
                    Some(m.pattern.id.clone()),
                ));
            }
        }

        fresh.extend(self.question_suggestions(&assessment, &sample, snapshot.timestamp));

        if self.tracker.duration_sec() >= TOPIC_GAP_MIN_DURATION_SEC {
            if let Some(topic) = self.tracker.suggest_next_topic(self.tracker.active_patterns()) {
                let priority = if topic.importance == Importance::High { 2 } else { 1 };
                fresh.push(self.new_suggestion(
                    SuggestionKind::TopicGap,
                    format!("Topic not yet explored: {}", topic.name),
                    priority,
                    format!("'{}' has not come up this session", topic.name),
                    snapshot.timestamp,
                    None,
                    0.5,
                    None,
                ));
            }
        }

        self.merge(fresh);
        &self.active
    }

    /// Fold transcript text into topic coverage; when the monitored party
    /// says something containing a high-severity keyword, run the detector
    /// immediately and prepend a priority-5 alert, bypassing the throttle.
    pub fn handle_transcript(&mut self, fragment: &TranscriptFragment) -> Option<Suggestion> {
        if self.phase != AgentPhase::Active {
            return None;
        }
        self.tracker
            .scan_transcript(&fragment.text, self.last_emotion, fragment.timestamp);

        if fragment.speaker != Speaker::MonitoredParty
            || !self.config.crisis_detection_enabled
            || !self.detector.contains_high_severity_keyword(&fragment.text)
        {
            return None;
        }

        let assessment =
            self.detector
                .assess(&self.history, Some(&fragment.text), fragment.timestamp);
        self.tracker.record_risk_indicators(&assessment.indicators);
        if assessment.level < RiskLevel::High {
            return None;
        }

        let action = assessment
            .recommended_actions
            .first()
            .cloned()
            .unwrap_or_else(|| "Conduct an immediate safety assessment".to_string());
        let triggers: Vec<String> = assessment
            .indicators
            .iter()
            .flat_map(|i| i.triggers.iter().cloned())
            .collect();
        let suggestion = self.new_suggestion(
            SuggestionKind::RiskAlert,
            format!("Safety concern in what was just said. {action}"),
            5,
            format!("Triggered by: {}", triggers.join(", ")),
            fragment.timestamp,
            None,
            assessment.score,
            None,
        );

        // A repeated crisis phrase replaces the earlier alert rather than
        // stacking a second entry with the same content.
        self.active.retain(|s| s.content != suggestion.content);
        self.active.insert(0, suggestion.clone());
        self.active.truncate(self.config.max_active_suggestions.max(1));
        self.tracker.record_suggestion(suggestion.clone());
        self.bus.emit(&SessionEvent::RiskAlert {
            level: assessment.level,
            suggestion: suggestion.clone(),
            timestamp: fragment.timestamp,
        });
        Some(suggestion)
    }

    /// Flag an active suggestion as used.
    pub fn use_suggestion(&mut self, id: u64) -> bool {
        match self.active.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                s.used = true;
                self.tracker.mark_used(id);
                true
            }
            None => false,
        }
    }

    /// Flag an active suggestion as dismissed.
    pub fn dismiss_suggestion(&mut self, id: u64) -> bool {
        match self.active.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                s.dismissed = true;
                self.tracker.mark_dismissed(id);
                true
            }
            None => false,
        }
    }

    fn risk_suggestion(
        &mut self,
        assessment: &RiskAssessment,
        now: DateTime<Utc>,
    ) -> Option<Suggestion> {
        let triggers: Vec<String> = assessment
            .indicators
            .iter()
            .flat_map(|i| i.triggers.iter().cloned())
            .collect();
        let action = assessment
            .recommended_actions
            .first()
            .cloned()
            .unwrap_or_default();

        match assessment.level {
            RiskLevel::Crisis => Some(self.new_suggestion(
                SuggestionKind::RiskAlert,
                format!("Crisis-level risk detected. {action}"),
                5,
                format!("Triggered by: {}", triggers.join(", ")),
                now,
                None,
                assessment.score,
                None,
            )),
            RiskLevel::High => Some(self.new_suggestion(
                SuggestionKind::RiskAlert,
                format!("Elevated risk detected. {action}"),
                4,
                format!("Triggered by: {}", triggers.join(", ")),
                now,
                None,
                assessment.score,
                None,
            )),
            RiskLevel::Moderate => Some(self.new_suggestion(
                SuggestionKind::Insight,
                format!(
                    "Emotional trajectory appears {}",
                    assessment.trajectory.as_str()
                ),
                2,
                "Moderate risk signals in the recent emotion history".to_string(),
                now,
                None,
                assessment.score,
                None,
            )),
            RiskLevel::Low => None,
        }
    }

    fn question_suggestions(
        &mut self,
        assessment: &RiskAssessment,
        sample: &EmotionSample,
        now: DateTime<Utc>,
    ) -> Vec<Suggestion> {
        let active_pattern_topics: Vec<String> = self
            .tracker
            .active_patterns()
            .iter()
            .flat_map(|m| m.pattern.question_topics.iter().cloned())
            .collect();
        let recent_topics: Vec<String> = self
            .tracker
            .recently_discussed(now, RECENT_TOPIC_WINDOW_SEC)
            .iter()
            .map(|id| pattern_topic_alias(id).to_string())
            .collect();
        let used_texts: Vec<String> = self
            .tracker
            .state()
            .suggestions
            .iter()
            .filter(|s| s.kind == SuggestionKind::Question)
            .map(|s| s.content.clone())
            .collect();

        let ctx = QuestionContext {
            dominant: sample.dominant,
            active_pattern_topics,
            elapsed_sec: self.tracker.duration_sec(),
            crisis_mode: assessment.level >= RiskLevel::High,
            recent_topics,
            used_texts,
        };

        let candidates = self.bank.select(&ctx, QUESTION_LIMIT);
        let mut suggestions = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let text = match (&self.rephraser, self.config.rephrasing_enabled) {
                (Some(rephraser), true) => rephrase_or_original(rephraser.as_ref(), &candidate.text),
                _ => candidate.text.clone(),
            };
            suggestions.push(self.new_suggestion(
                SuggestionKind::Question,
                text,
                candidate.priority,
                candidate.reasoning,
                now,
                Some(sample.dominant),
                0.5,
                None,
            ));
        }
        suggestions
    }

    /// Merge a pass's fresh suggestions into the active list: drop anything
    /// already used or dismissed, skip duplicate content, sort by priority
    /// descending, and cap the list.
    fn merge(&mut self, fresh: Vec<Suggestion>) {
        self.active.retain(|s| !s.used && !s.dismissed);

        let mut accepted = Vec::new();
        for suggestion in fresh {
            let duplicate = self.active.iter().chain(accepted.iter()).any(|s| s.content == suggestion.content);
            if duplicate {
                continue;
            }
            accepted.push(suggestion);
        }

        for suggestion in &accepted {
            self.tracker.record_suggestion(suggestion.clone());
        }

        self.active.extend(accepted.iter().cloned());
        self.active.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.active.truncate(self.config.max_active_suggestions);

        for suggestion in &accepted {
            self.bus.emit(&SessionEvent::SuggestionGenerated {
                suggestion: suggestion.clone(),
                timestamp: suggestion.timestamp,
            });
            if suggestion.kind == SuggestionKind::RiskAlert {
                self.bus.emit(&SessionEvent::RiskAlert {
                    level: self.current_risk_level(),
                    suggestion: suggestion.clone(),
                    timestamp: suggestion.timestamp,
                });
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn new_suggestion(
        &mut self,
        kind: SuggestionKind,
        content: String,
        priority: u8,
        reasoning: String,
        timestamp: DateTime<Utc>,
        trigger_emotion: Option<EmotionLabel>,
        confidence: f64,
        condition: Option<String>,
    ) -> Suggestion {
        let id = self.next_suggestion_id;
        self.next_suggestion_id += 1;
        Suggestion {
            id,
            kind,
            content,
            priority,
            reasoning,
            timestamp,
            trigger_emotion,
            confidence,
            condition,
            dismissed: false,
            used: false,
        }
    }
}
