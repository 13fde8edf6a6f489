//! Chat stream transport.
//!
//! The backend answers `POST {message, history}` with a chunked plain-text
//! stream. Chunk boundaries are arbitrary and may split multi-byte UTF-8
//! sequences, so decoding carries incomplete trailing bytes into the next
//! chunk instead of emitting replacement characters mid-stream.

use crate::error::TransportError;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

/// Request body for one turn: the new user message plus the prior transcript.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryMessage>,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Opens the chunked text stream for one turn.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open_stream(&self, request: ChatRequest) -> Result<ChunkStream, TransportError>;
}

// ── HTTP Transport ─────────────────────────────────────────

pub struct HttpChatTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

/// Decode as much of `carry` as is valid UTF-8, leaving an incomplete
/// trailing sequence in place for the next chunk. A genuinely invalid
/// sequence is replaced rather than stalling the stream.
fn drain_utf8(carry: &mut Vec<u8>) -> String {
    match std::str::from_utf8(carry) {
        Ok(text) => {
            let out = text.to_string();
            carry.clear();
            out
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let out = String::from_utf8_lossy(&carry[..valid]).into_owned();
            carry.drain(..valid);
            out
        }
        Err(_) => {
            let out = String::from_utf8_lossy(carry).into_owned();
            carry.clear();
            out
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open_stream(&self, request: ChatRequest) -> Result<ChunkStream, TransportError> {
        let client = self.client.clone();
        let url = self.endpoint.clone();

        let response = crate::utils::http::request_with_retry(
            move || {
                let client = client.clone();
                let url = url.clone();
                let body = request.clone();
                async move { client.post(&url).json(&body).send().await }
            },
            3,
        )
        .await
        .map_err(TransportError::Connect)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::Connect(format!(
                "chat endpoint returned {}: {}",
                status, error_text
            )));
        }

        let mut carry: Vec<u8> = Vec::new();
        let stream = response
            .bytes_stream()
            .map(move |chunk_result| match chunk_result {
                Ok(bytes) => {
                    carry.extend_from_slice(&bytes);
                    Ok(drain_utf8(&mut carry))
                }
                Err(e) => Err(TransportError::Read(e.to_string())),
            })
            .filter_map(|res| async {
                match res {
                    Ok(text) if text.is_empty() => None,
                    other => Some(other),
                }
            });

        Ok(Box::pin(stream))
    }
}

// ── Tests ──────────────────────────────────────────────────
