//! Empathic Core - In-session decision-support engine for emotion-aware therapy assistance
//!
//! The engine turns a continuous stream of detected emotional states and
//! transcript fragments into prioritized, explainable suggestions for a
//! clinician: safety alerts, candidate questions, behavioral-pattern notices,
//! and topic-coverage gaps. It never diagnoses; every output is advisory.
//!
//! ## Modules
//!
//! - **Session Agent**: orchestrates risk detection, pattern matching,
//!   question selection, and topic tracking per incoming snapshot
//! - **Risk Detector**: keyword, trajectory, and acute-state passes over the
//!   emotion history and transcript text
//! - **Pattern Matcher**: scores the history against a clinical pattern
//!   catalog via profile similarity and behavioral markers
//! - **Session Tracker**: topic coverage, emotional timeline, and reporting

pub mod agent;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod markers;
pub mod matcher;
pub mod questions;
pub mod risk;
pub mod session;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use agent::{AgentPhase, SessionAgent};
pub use catalog::{ClinicalPattern, PatternCatalog, TopicCatalog, TopicDefinition};
pub use config::AgentConfig;
pub use error::EngineError;
pub use events::{EventBus, ListenerId, SessionEvent};
pub use matcher::PatternMatcher;
pub use questions::{QuestionBank, Rephraser};
pub use risk::RiskDetector;
pub use session::{SessionReport, SessionTracker, TrackerConfig};
pub use types::{
    EmotionLabel, EmotionSample, EmotionScores, EmotionSnapshot, PatternMatch, RiskAssessment,
    RiskIndicator, RiskLevel, Speaker, Suggestion, SuggestionKind, Trajectory, TranscriptFragment,
};

/// Engine version embedded in reports and the FFI surface
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported payloads
pub const PRODUCER_NAME: &str = "empathic-core";
