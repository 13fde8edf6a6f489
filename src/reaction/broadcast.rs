//! Phygital state poll and broadcast reactions.
//!
//! A companion device exposes ambient state (sensor readings plus an
//! optional pushed broadcast message) on a poll endpoint. Broadcasts are
//! spoken at most once per id and dropped entirely when they arrive stale.

use crate::avatar::AmbientTheme;
use crate::config::PhygitalConfig;
use crate::speech::Speaker;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Broadcasts older than this relative to receipt are discarded.
pub const BROADCAST_STALE_SECS: i64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastEvent {
    pub id: String,
    pub text: String,
    /// Unix timestamp in seconds, stamped by the sending device.
    pub timestamp: i64,
}

/// One poll result from the phygital endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhygitalState {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub temp: Option<f32>,
    #[serde(default)]
    pub reaction: Option<String>,
    #[serde(default)]
    pub broadcast: Option<BroadcastEvent>,
}

// ── Broadcast Filter ───────────────────────────────────────

/// Decides which polled broadcasts get spoken: each id at most once, and
/// nothing stale. The id is recorded even for stale events so a late
/// re-delivery stays silent.
#[derive(Debug, Default)]
pub struct BroadcastFilter {
    last_id: Option<String>,
}

impl BroadcastFilter {
    pub fn admit(&mut self, event: &BroadcastEvent, now_secs: i64) -> bool {
        if self.last_id.as_deref() == Some(event.id.as_str()) {
            return false;
        }
        self.last_id = Some(event.id.clone());
        now_secs - event.timestamp < BROADCAST_STALE_SECS
    }
}

// ── Poller ─────────────────────────────────────────────────

/// Background loop polling the phygital endpoint. Started at most once;
/// stopping flips the flag and the loop exits at its next wakeup.
#[derive(Clone)]
pub struct PhygitalPoller {
    running: Arc<AtomicBool>,
}

impl Default for PhygitalPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl PhygitalPoller {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn start(
        &self,
        config: PhygitalConfig,
        speaker: Arc<Speaker>,
        theme: Arc<Mutex<AmbientTheme>>,
    ) {
        // Claim the running flag atomically so racing starts spawn one loop.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("[Phygital] Poller already running");
            return;
        }
        let poller = self.clone();

        tokio::spawn(async move {
            tracing::info!("[Phygital] Poller started");
            let client = reqwest::Client::new();
            let mut filter = BroadcastFilter::default();
            let interval = Duration::from_secs(config.poll_interval_secs.max(1));

            loop {
                if !poller.running.load(Ordering::Relaxed) {
                    break;
                }

                match fetch_state(&client, &config.state_url).await {
                    Ok(state) => {
                        if let Some(temp) = state.temp {
                            if temp > 0.0 {
                                let mut theme = theme.lock().unwrap_or_else(|e| e.into_inner());
                                theme.temperature = temp;
                            }
                        }
                        // One-shot reaction text; the device clears it after
                        // serving it once.
                        if let Some(reaction) = &state.reaction {
                            if !reaction.trim().is_empty() {
                                speaker.speak(reaction).await;
                            }
                        }
                        if let Some(broadcast) = &state.broadcast {
                            let now_secs = chrono::Utc::now().timestamp();
                            if filter.admit(broadcast, now_secs) {
                                speaker.speak(&broadcast.text).await;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("[Phygital] Poll failed: {}", e);
                    }
                }

                tokio::time::sleep(interval).await;
            }

            tracing::info!("[Phygital] Poller stopped");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

async fn fetch_state(client: &reqwest::Client, url: &str) -> Result<PhygitalState, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Endpoint returned {}", response.status()));
    }

    response
        .json()
        .await
        .map_err(|e| format!("Parse failed: {}", e))
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, timestamp: i64) -> BroadcastEvent {
        BroadcastEvent {
            id: id.to_string(),
            text: "Essen ist fertig!".to_string(),
            timestamp,
        }
    }

    #[test]
    fn fresh_broadcast_is_spoken_once_per_id() {
        let mut filter = BroadcastFilter::default();
        assert!(filter.admit(&event("b1", 100), 102));
        // Same id on the next poll: already handled
        assert!(!filter.admit(&event("b1", 100), 107));
        // New id goes through again
        assert!(filter.admit(&event("b2", 107), 108));
    }

    #[test]
    fn device_stamped_broadcast_is_judged_fresh() {
        // The sending device stamps unix seconds; a just-set broadcast must
        // pass the staleness check against the receipt clock.
        let mut filter = BroadcastFilter::default();
        let now = chrono::Utc::now().timestamp();
        assert!(
            filter.admit(&event("b1", now - 2), now),
            "two-second-old broadcast judged stale"
        );
    }

    #[test]
    fn stale_broadcast_is_discarded_even_when_novel() {
        let mut filter = BroadcastFilter::default();
        assert!(!filter.admit(&event("b1", 0), BROADCAST_STALE_SECS + 1));
    }

    #[test]
    fn stale_broadcast_still_marks_its_id_handled() {
        let mut filter = BroadcastFilter::default();
        assert!(!filter.admit(&event("b1", 0), BROADCAST_STALE_SECS + 1));
        // A late re-delivery with a fresh timestamp stays silent
        assert!(!filter.admit(
            &event("b1", BROADCAST_STALE_SECS + 2),
            BROADCAST_STALE_SECS + 3
        ));
    }

    #[tokio::test]
    async fn second_start_does_not_spawn_a_second_loop() {
        use crate::speech::{NullSink, Speaker};
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let config = crate::config::PhygitalConfig {
            enabled: true,
            state_url: server.uri(),
            poll_interval_secs: 60,
        };
        let speaker = Arc::new(Speaker::new("http://127.0.0.1:9/tts", Box::new(NullSink)));
        let theme = Arc::new(Mutex::new(crate::avatar::AmbientTheme::default()));

        let poller = PhygitalPoller::new();
        poller.start(config.clone(), speaker.clone(), theme.clone());
        poller.start(config, speaker, theme);
        assert!(poller.is_running());

        // Each live loop polls once immediately, then sleeps the interval.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let polls = server.received_requests().await.unwrap().len();
        assert_eq!(polls, 1, "a duplicate loop would have polled again");

        poller.stop();
    }

    #[tokio::test]
    async fn fetch_parses_partial_payloads() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"state":"idle","temp":21.5}"#),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let state = fetch_state(&client, &server.uri()).await.unwrap();
        assert_eq!(state.state.as_deref(), Some("idle"));
        assert_eq!(state.temp, Some(21.5));
        assert!(state.broadcast.is_none());
    }
}
