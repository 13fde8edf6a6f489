//! Error taxonomy for the engine.
//!
//! None of these are fatal: a transport error fails the current turn only,
//! a playback error clears the speaking flag and moves on, and malformed
//! markup degrades to "no effect" without ever surfacing an error.

use thiserror::Error;

/// Failures while talking to the chat backend.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to reach chat backend: {0}")]
    Connect(String),
    #[error("stream read failed: {0}")]
    Read(String),
}

/// Failures in the speech synthesis / playback pathway.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
}
