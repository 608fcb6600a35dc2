//! Replay a short synthetic session through the agent

use chrono::{Duration, Utc};
use empathic_core::{
    AgentConfig, EmotionLabel, EmotionScores, EmotionSnapshot, SessionAgent, Speaker,
    TranscriptFragment,
};

fn main() {
    let start = Utc::now();
    let mut agent = SessionAgent::new(AgentConfig::default(), start);
    agent.subscribe(|event| {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    });
    agent.start(Some("demo-session".to_string()), start);

    for i in 0..12 {
        let ts = start + Duration::seconds(10 * (i + 1));
        agent.handle_snapshot(&EmotionSnapshot {
            label: EmotionLabel::Sad,
            confidence: 0.9,
            scores: EmotionScores {
                sad: 0.9,
                neutral: 0.1,
                ..Default::default()
            },
            timestamp: ts,
            transcript_excerpt: None,
        });
    }

    agent.handle_transcript(&TranscriptFragment {
        text: "I haven't been able to sleep, I'm tired all the time".to_string(),
        speaker: Speaker::MonitoredParty,
        timestamp: start + Duration::seconds(130),
    });

    let report = agent.end(start + Duration::seconds(140));
    match serde_json::to_string_pretty(&report) {
        Ok(json) => eprintln!("{json}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
