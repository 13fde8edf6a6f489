//! Speech synthesis pathway.
//!
//! Chat turns and ambient reactions all speak through one [`Speaker`], which
//! serializes playback: a new utterance cancels any fallback speech first and
//! waits for the previous server-synthesized clip to release its audio
//! resource before starting. Synthesis and playback failures are logged and
//! swallowed so the conversation always returns to "ready for next turn".

use crate::error::PlaybackError;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};

/// Plays one synthesized clip to completion.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Cancel any in-flight fallback speech (e.g. a local TTS stand-in used
    /// while the backend is unreachable). Called before every new utterance.
    fn cancel_fallback(&self);

    /// Play the clip and return once the audio resource is released.
    async fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError>;
}

/// Sink for headless runs: drops the audio immediately.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    fn cancel_fallback(&self) {}

    async fn play(&self, _audio: Vec<u8>) -> Result<(), PlaybackError> {
        Ok(())
    }
}

// ── Speaker ────────────────────────────────────────────────

pub struct Speaker {
    client: reqwest::Client,
    endpoint: String,
    sink: Box<dyn AudioSink>,
    speaking: AtomicBool,
    // Serializes playback so two clips never overlap.
    playback_gate: tokio::sync::Mutex<()>,
}

impl Speaker {
    pub fn new(endpoint: impl Into<String>, sink: Box<dyn AudioSink>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            sink,
            speaking: AtomicBool::new(false),
            playback_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// True while audio playback is active. Read every frame for lip sync.
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Relaxed)
    }

    /// Synthesize and play one utterance. Empty text is a no-op. Failures
    /// are logged, never propagated.
    pub async fn speak(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.sink.cancel_fallback();

        let audio = match self.synthesize(text).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!("[Speech] Synthesis failed: {}", e);
                return;
            }
        };

        let _gate = self.playback_gate.lock().await;
        self.speaking.store(true, Ordering::Relaxed);
        if let Err(e) = self.sink.play(audio).await {
            tracing::warn!("[Speech] Playback failed: {}", e);
        }
        self.speaking.store(false, Ordering::Relaxed);
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, PlaybackError> {
        let client = self.client.clone();
        let url = self.endpoint.clone();
        let body = json!({ "text": text });

        let response = crate::utils::http::request_with_retry(
            move || {
                let client = client.clone();
                let url = url.clone();
                let body = body.clone();
                async move { client.post(&url).json(&body).send().await }
            },
            3,
        )
        .await
        .map_err(PlaybackError::Synthesis)?;

        if !response.status().is_success() {
            return Err(PlaybackError::Synthesis(format!(
                "speech endpoint returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlaybackError::Synthesis(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// ── Tests ──────────────────────────────────────────────────
