//! Shared config utilities for loading/saving JSON config files,
//! plus the engine's own configuration sections.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Generic load for any Serde config type with a `Default` implementation.
/// Falls back to `T::default()` if the file is missing or unparsable.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path, label: &str) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<T>(&content) {
            Ok(config) => {
                tracing::info!("[{}] Loaded config from {}", label, path.display());
                config
            }
            Err(e) => {
                tracing::warn!(
                    "[{}] Failed to parse config {}: {} — using defaults",
                    label,
                    path.display(),
                    e
                );
                T::default()
            }
        },
        Err(_) => {
            tracing::info!(
                "[{}] No config file at {} — using defaults",
                label,
                path.display()
            );
            T::default()
        }
    }
}

/// Generic save for any Serde config type.
pub fn save_json_config<T: Serialize>(path: &Path, config: &T, label: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, json).map_err(|e| format!("Failed to write config file: {}", e))?;
    Ok(())
}

/// Resolve the platform data directory for engine state files
/// (cooldown stamps, saved settings).
pub fn data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("com.chyin.hikari")
}

// ── Engine Configuration ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Chat endpoint. Streams the assistant reply as chunked plain text.
    pub chat_url: String,
    /// Speech synthesis endpoint. POST `{text}` → audio bytes.
    pub speech_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            chat_url: "http://127.0.0.1:8000/chat_stream".to_string(),
            speech_url: "http://127.0.0.1:8000/tts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhygitalConfig {
    pub enabled: bool,
    /// Ambient state poll endpoint (sensor state, temp, broadcast queue).
    pub state_url: String,
    pub poll_interval_secs: u64,
}

impl Default for PhygitalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            state_url: "http://127.0.0.1:8000/phygital/state".to_string(),
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub enabled: bool,
    /// Frame analysis endpoint. POST multipart image → detected subjects.
    pub analyze_url: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            analyze_url: "http://127.0.0.1:8000/api/vision/analyze".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub phygital: PhygitalConfig,
    #[serde(default)]
    pub vision: VisionConfig,
}
