//! Question bank
//!
//! Candidate-question selection for the agent. Templates are keyed by the
//! dominant emotion and by question topic; selection applies the session
//! context filters (elapsed time, crisis mode, recently discussed topics,
//! already-asked questions) and ranks the survivors.
//!
//! Rephrasing is a seam: callers may plug in a [`Rephraser`] (typically
//! backed by a language model outside this crate). Rephrase failures are
//! logged and fall back to the original text, never surfaced.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::EmotionLabel;

/// One entry in the bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionTemplate {
    pub text: String,
    /// Question-topic vocabulary shared with the pattern catalog
    pub topic: String,
    /// When set, the template is boosted while this emotion is dominant
    pub emotion: Option<EmotionLabel>,
    pub priority: u8,
    /// Session seconds that must elapse before the template is eligible
    pub min_elapsed_sec: i64,
    /// Safety questions reserved for crisis mode
    pub crisis_only: bool,
}

/// Session context a selection call runs under.
#[derive(Debug, Clone)]
pub struct QuestionContext {
    pub dominant: EmotionLabel,
    /// Question topics referenced by currently active patterns
    pub active_pattern_topics: Vec<String>,
    pub elapsed_sec: i64,
    pub crisis_mode: bool,
    /// Topic ids discussed recently enough to skip
    pub recent_topics: Vec<String>,
    /// Texts already suggested this session
    pub used_texts: Vec<String>,
}

/// A selected question, ready for optional rephrasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateQuestion {
    pub id: u64,
    pub text: String,
    pub topic: String,
    pub priority: u8,
    pub reasoning: String,
}

/// Optional rewording hook.
///
/// Implementations may fail or return an empty string; both degrade to the
/// original text at the call site.
pub trait Rephraser {
    fn rephrase(&self, text: &str) -> Result<String, EngineError>;
}

/// Run `rephraser` over `text`, keeping the original on failure or an empty
/// result.
pub fn rephrase_or_original(rephraser: &dyn Rephraser, text: &str) -> String {
    match rephraser.rephrase(text) {
        Ok(replacement) if !replacement.trim().is_empty() => replacement,
        Ok(_) => text.to_string(),
        Err(err) => {
            log::warn!("rephrase failed, keeping original text: {err}");
            text.to_string()
        }
    }
}

/// Template store with a per-instance monotonic question id counter.
pub struct QuestionBank {
    templates: Vec<QuestionTemplate>,
    next_id: u64,
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self::new(default_templates())
    }
}

impl QuestionBank {
    pub fn new(templates: Vec<QuestionTemplate>) -> Self {
        Self {
            templates,
            next_id: 0,
        }
    }

    pub fn templates(&self) -> &[QuestionTemplate] {
        &self.templates
    }

    /// Select up to `max` candidate questions for the given context.
    ///
    /// Crisis mode restricts the bank to its safety templates. Outside crisis
    /// mode, safety templates are held back, templates gated on elapsed time
    /// wait their turn, and anything touching a recently discussed topic or
    /// an already-asked text is skipped. Survivors are ranked by priority
    /// with boosts for pattern-linked topics and a dominant-emotion match.
    pub fn select(&mut self, ctx: &QuestionContext, max: usize) -> Vec<CandidateQuestion> {
        let mut ranked: Vec<(f64, &QuestionTemplate)> = self
            .templates
            .iter()
            .filter(|t| t.crisis_only == ctx.crisis_mode)
            .filter(|t| ctx.elapsed_sec >= t.min_elapsed_sec)
            .filter(|t| !ctx.recent_topics.contains(&t.topic))
            .filter(|t| !ctx.used_texts.contains(&t.text))
            .map(|t| {
                let mut score = t.priority as f64;
                if ctx.active_pattern_topics.contains(&t.topic) {
                    score += 2.0;
                }
                if t.emotion == Some(ctx.dominant) {
                    score += 1.0;
                }
                (score, t)
            })
            .collect();

        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut selected = Vec::new();
        let mut seen_topics: Vec<&str> = Vec::new();
        for (_, template) in ranked {
            if selected.len() >= max {
                break;
            }
            // One question per topic per pass
            if seen_topics.contains(&template.topic.as_str()) {
                continue;
            }
            seen_topics.push(&template.topic);

            let reasoning = if ctx.active_pattern_topics.contains(&template.topic) {
                format!("Follows up on an active pattern around {}", template.topic)
            } else if template.emotion == Some(ctx.dominant) {
                format!(
                    "Matched to the current dominant emotion ({})",
                    ctx.dominant.as_str()
                )
            } else {
                format!("Explores {}", template.topic)
            };

            let id = self.next_id;
            self.next_id += 1;
            selected.push(CandidateQuestion {
                id,
                text: template.text.clone(),
                topic: template.topic.clone(),
                priority: template.priority,
                reasoning,
            });
        }
        selected
    }
}

fn template(
    text: &str,
    topic: &str,
    emotion: Option<EmotionLabel>,
    priority: u8,
    min_elapsed_sec: i64,
    crisis_only: bool,
) -> QuestionTemplate {
    QuestionTemplate {
        text: text.to_string(),
        topic: topic.to_string(),
        emotion,
        priority,
        min_elapsed_sec,
        crisis_only,
    }
}

fn default_templates() -> Vec<QuestionTemplate> {
    use EmotionLabel::*;
    vec![
        template(
            "Are you having any thoughts of hurting yourself?",
            "safety",
            None,
            5,
            0,
            true,
        ),
        template("Do you feel safe right now?", "safety", None, 5, 0, true),
        template(
            "How long have you been feeling this way?",
            "mood",
            Some(Sad),
            2,
            0,
            false,
        ),
        template(
            "What has been weighing on you the most lately?",
            "mood",
            Some(Sad),
            2,
            0,
            false,
        ),
        template(
            "What has been going well for you recently?",
            "mood",
            Some(Happy),
            1,
            0,
            false,
        ),
        template(
            "Something seemed to catch you off guard just now. What came up for you?",
            "mood",
            Some(Surprise),
            2,
            0,
            false,
        ),
        template(
            "How are you feeling right now, in this moment?",
            "mood",
            Some(Neutral),
            1,
            0,
            false,
        ),
        template("How have you been sleeping?", "sleep", None, 2, 0, false),
        template(
            "How has your energy been from day to day?",
            "energy",
            None,
            1,
            0,
            false,
        ),
        template(
            "What has been your biggest source of stress lately?",
            "stress",
            None,
            2,
            0,
            false,
        ),
        template(
            "What do you usually do to cope when things get hard?",
            "coping",
            None,
            2,
            120,
            false,
        ),
        template(
            "Who do you feel closest to right now?",
            "connection",
            None,
            2,
            120,
            false,
        ),
        template(
            "Who can you reach out to when things get difficult?",
            "support",
            None,
            2,
            120,
            false,
        ),
        template(
            "Is there a past experience you feel might be connected to what you're going through?",
            "trauma",
            None,
            3,
            600,
            false,
        ),
        template(
            "How do you tend to talk to yourself when something goes wrong?",
            "self_esteem",
            None,
            2,
            600,
            false,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx() -> QuestionContext {
        QuestionContext {
            dominant: EmotionLabel::Sad,
            active_pattern_topics: vec![],
            elapsed_sec: 0,
            crisis_mode: false,
            recent_topics: vec![],
            used_texts: vec![],
        }
    }

    struct FailingRephraser;
    impl Rephraser for FailingRephraser {
        fn rephrase(&self, _text: &str) -> Result<String, EngineError> {
            Err(EngineError::RephraseFailed("model unavailable".to_string()))
        }
    }

    struct EmptyRephraser;
    impl Rephraser for EmptyRephraser {
        fn rephrase(&self, _text: &str) -> Result<String, EngineError> {
            Ok("   ".to_string())
        }
    }

    struct UpperRephraser;
    impl Rephraser for UpperRephraser {
        fn rephrase(&self, text: &str) -> Result<String, EngineError> {
            Ok(text.to_uppercase())
        }
    }

    #[test]
    fn test_crisis_mode_selects_safety_questions_only() {
        let mut bank = QuestionBank::default();
        let mut context = ctx();
        context.crisis_mode = true;

        let selected = bank.select(&context, 3);
        assert!(!selected.is_empty());
        for q in &selected {
            assert_eq!(q.topic, "safety");
            assert_eq!(q.priority, 5);
        }
    }

    #[test]
    fn test_safety_questions_held_back_outside_crisis() {
        let mut bank = QuestionBank::default();
        let selected = bank.select(&ctx(), 10);
        assert!(selected.iter().all(|q| q.topic != "safety"));
    }

    #[test]
    fn test_elapsed_gate() {
        let mut bank = QuestionBank::default();

        let early = bank.select(&ctx(), 20);
        assert!(early.iter().all(|q| q.topic != "trauma"));

        let mut bank = QuestionBank::default();
        let mut context = ctx();
        context.elapsed_sec = 700;
        context.active_pattern_topics = vec!["trauma".to_string()];
        let late = bank.select(&context, 20);
        assert!(late.iter().any(|q| q.topic == "trauma"));
    }

    #[test]
    fn test_recent_topic_and_used_text_filters() {
        let mut bank = QuestionBank::default();
        let mut context = ctx();
        context.recent_topics = vec!["sleep".to_string()];
        context.used_texts = vec!["How long have you been feeling this way?".to_string()];

        let selected = bank.select(&context, 20);
        assert!(selected.iter().all(|q| q.topic != "sleep"));
        assert!(selected
            .iter()
            .all(|q| q.text != "How long have you been feeling this way?"));
    }

    #[test]
    fn test_pattern_topics_rank_first() {
        let mut bank = QuestionBank::default();
        let mut context = ctx();
        context.active_pattern_topics = vec!["stress".to_string()];

        let selected = bank.select(&context, 3);
        assert_eq!(selected[0].topic, "stress");
        assert!(selected[0].reasoning.contains("active pattern"));
    }

    #[test]
    fn test_one_question_per_topic_and_max_respected() {
        let mut bank = QuestionBank::default();
        let selected = bank.select(&ctx(), 3);

        assert!(selected.len() <= 3);
        let mut topics: Vec<&str> = selected.iter().map(|q| q.topic.as_str()).collect();
        topics.sort();
        topics.dedup();
        assert_eq!(topics.len(), selected.len());
    }

    #[test]
    fn test_question_ids_are_monotonic() {
        let mut bank = QuestionBank::default();
        let first = bank.select(&ctx(), 2);
        let second = bank.select(&ctx(), 2);

        let mut ids: Vec<u64> = first.iter().chain(second.iter()).map(|q| q.id).collect();
        let sorted = ids.clone();
        ids.dedup();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_rephrase_fallbacks() {
        assert_eq!(rephrase_or_original(&FailingRephraser, "original"), "original");
        assert_eq!(rephrase_or_original(&EmptyRephraser, "original"), "original");
        assert_eq!(rephrase_or_original(&UpperRephraser, "original"), "ORIGINAL");
    }
}
