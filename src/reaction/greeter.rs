//! Vision-detection greetings.
//!
//! Camera frames are analyzed by the vision endpoint; recognized subjects
//! get a personal greeting, unrecognized-but-alertable visits fall back to a
//! shared guest greeting. Both paths run through the reaction cooldown so a
//! person lingering in frame is greeted at most once per window.

use crate::reaction::cooldown::{ReactionCooldowns, UNKNOWN_GUEST_KEY};
use rand::seq::SliceRandom;
use serde::Deserialize;

/// Label the detector uses for faces it cannot identify.
const UNKNOWN_LABEL: &str = "Unknown";

const KNOWN_GREETINGS: &[&str] = &[
    "Hallo {name}! Schön, dich zu sehen!",
    "Hey {name}, willkommen zurück!",
    "Na, {name}? Da bist du ja wieder!",
    "{name}! Ich habe dich schon vermisst!",
];

const GUEST_GREETINGS: &[&str] = &[
    "Oh, hallo! Dich kenne ich noch gar nicht.",
    "Willkommen! Wer bist du denn?",
    "Hallo, unbekannter Besuch! Schön, dass du da bist.",
];

/// Result of analyzing one camera frame.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionEvent {
    #[serde(default)]
    pub detected: Vec<String>,
    /// True when the detector flagged the frame as alert-worthy
    /// (an unrecognized visitor).
    #[serde(default)]
    pub alert: bool,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    detected: Vec<String>,
    #[serde(default)]
    action: Option<String>,
}

/// Send one camera frame to the vision endpoint.
pub async fn analyze_frame(
    client: &reqwest::Client,
    url: &str,
    frame: Vec<u8>,
) -> Result<DetectionEvent, String> {
    let part = reqwest::multipart::Part::bytes(frame)
        .file_name("frame.jpg")
        .mime_str("image/jpeg")
        .map_err(|e| format!("Invalid frame part: {}", e))?;
    let form = reqwest::multipart::Form::new().part("image", part);

    let response = client
        .post(url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| format!("Vision request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Vision endpoint returned {}", response.status()));
    }

    let parsed: AnalyzeResponse = response
        .json()
        .await
        .map_err(|e| format!("Vision response parse failed: {}", e))?;

    if !parsed.status.is_empty() && parsed.status != "ok" {
        tracing::debug!("[Vision] Analysis status: {}", parsed.status);
    }

    Ok(DetectionEvent {
        detected: parsed.detected,
        alert: parsed.action.as_deref() == Some("alert"),
    })
}

// ── Greeter ────────────────────────────────────────────────

pub struct Greeter {
    cooldowns: ReactionCooldowns,
}

impl Greeter {
    pub fn new(cooldowns: ReactionCooldowns) -> Self {
        Self { cooldowns }
    }

    /// Turn one detection event into greeting utterances, at most one per
    /// subject per cooldown window. The unknown-guest path only fires when
    /// no known subject was greeted.
    pub fn handle_detection(&mut self, event: &DetectionEvent, now_ms: i64) -> Vec<String> {
        let mut utterances = Vec::new();

        for name in &event.detected {
            let name = name.trim();
            if name.is_empty() || name == UNKNOWN_LABEL {
                continue;
            }
            if self.cooldowns.ready(name, now_ms) {
                utterances.push(pick_phrase(KNOWN_GREETINGS).replace("{name}", name));
                self.cooldowns.stamp(name, now_ms);
            }
        }

        if utterances.is_empty() && event.alert && self.cooldowns.ready(UNKNOWN_GUEST_KEY, now_ms)
        {
            utterances.push(pick_phrase(GUEST_GREETINGS));
            self.cooldowns.stamp(UNKNOWN_GUEST_KEY, now_ms);
        }

        utterances
    }

    /// Analyze one camera frame and speak the resulting greetings through
    /// the shared speech pathway.
    pub async fn react_to_frame(
        &mut self,
        client: &reqwest::Client,
        url: &str,
        frame: Vec<u8>,
        speaker: &crate::speech::Speaker,
    ) -> Result<(), String> {
        let event = analyze_frame(client, url, frame).await?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        for utterance in self.handle_detection(&event, now_ms) {
            speaker.speak(&utterance).await;
        }
        Ok(())
    }
}

fn pick_phrase(phrases: &[&str]) -> String {
    phrases
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction::cooldown::{MemoryStore, REACTION_COOLDOWN_MS};

    fn greeter() -> Greeter {
        Greeter::new(ReactionCooldowns::new(Box::new(MemoryStore::default())))
    }

    fn event(detected: &[&str], alert: bool) -> DetectionEvent {
        DetectionEvent {
            detected: detected.iter().map(|s| s.to_string()).collect(),
            alert,
        }
    }

    #[test]
    fn known_subject_is_greeted_once_per_window() {
        let mut greeter = greeter();

        let first = greeter.handle_detection(&event(&["Anna"], false), 0);
        assert_eq!(first.len(), 1);
        assert!(first[0].contains("Anna"));

        // Same person, still inside the window: no reaction
        let second = greeter.handle_detection(&event(&["anna "], false), 60_000);
        assert!(second.is_empty());

        // After the window the greeting fires again
        let third = greeter.handle_detection(&event(&["Anna"], false), REACTION_COOLDOWN_MS + 1);
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn unknown_label_never_triggers_personal_greeting() {
        let mut greeter = greeter();
        let out = greeter.handle_detection(&event(&["Unknown"], false), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn alertable_event_uses_shared_guest_key() {
        let mut greeter = greeter();

        let first = greeter.handle_detection(&event(&["Unknown"], true), 0);
        assert_eq!(first.len(), 1);

        // A different unrecognized visitor inside the window shares the key
        let second = greeter.handle_detection(&event(&[], true), 60_000);
        assert!(second.is_empty());
    }

    #[test]
    fn known_greeting_suppresses_guest_path() {
        let mut greeter = greeter();
        let out = greeter.handle_detection(&event(&["Anna", "Unknown"], true), 0);
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("Anna"));
    }

    #[test]
    fn multiple_known_subjects_each_get_greeted() {
        let mut greeter = greeter();
        let out = greeter.handle_detection(&event(&["Anna", "Ben"], false), 0);
        assert_eq!(out.len(), 2);
    }
}
