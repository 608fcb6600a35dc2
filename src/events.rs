//! Session events
//!
//! Synchronous listener dispatch for the agent's event stream. Listeners run
//! in registration order behind a per-listener panic boundary, so one failing
//! listener never suppresses the rest or corrupts agent state.

use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionReport;
use crate::types::{RiskLevel, Suggestion};

/// Everything the agent reports to the outside world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    SessionEnded {
        report: SessionReport,
        timestamp: DateTime<Utc>,
    },
    SuggestionGenerated {
        suggestion: Suggestion,
        timestamp: DateTime<Utc>,
    },
    RiskAlert {
        level: RiskLevel,
        suggestion: Suggestion,
        timestamp: DateTime<Utc>,
    },
    PatternDetected {
        pattern_id: String,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&SessionEvent)>;

/// Registry of event listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false when the id is unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Invoke every listener with `event`, isolating panics per listener.
    pub fn emit(&self, event: &SessionEvent) {
        for (id, listener) in &self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener(event)));
            if outcome.is_err() {
                log::error!("event listener {:?} panicked; continuing dispatch", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn started(ts: DateTime<Utc>) -> SessionEvent {
        SessionEvent::SessionStarted {
            session_id: "s".to_string(),
            timestamp: ts,
        }
    }

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(0));

        let seen_clone = Rc::clone(&seen);
        let id = bus.subscribe(move |_| *seen_clone.borrow_mut() += 1);

        bus.emit(&started(Utc::now()));
        assert_eq!(*seen.borrow(), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&started(Utc::now()));
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&seen);
        bus.subscribe(move |_| first.borrow_mut().push("first"));
        bus.subscribe(|_| panic!("bad listener"));
        let last = Rc::clone(&seen);
        bus.subscribe(move |_| last.borrow_mut().push("last"));

        bus.emit(&started(Utc::now()));
        assert_eq!(*seen.borrow(), vec!["first", "last"]);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = started(Utc::now());
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"session_started\""));
    }
}
