//! Per-subject reaction cooldowns, persisted across sessions.
//!
//! Keys are case/whitespace-normalized so the same person is never
//! double-counted because the detector changed its capitalization.

use crate::config::{data_dir, load_json_config, save_json_config};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Minimum elapsed time before the same subject triggers another reaction.
pub const REACTION_COOLDOWN_MS: i64 = 15 * 60 * 1000;

/// Shared cooldown key for unrecognized visitors.
pub const UNKNOWN_GUEST_KEY: &str = "unknown_guest";

/// Durable key → last-reaction-timestamp (unix ms) mapping.
pub trait CooldownStore: Send + Sync {
    fn load(&self) -> HashMap<String, i64>;
    fn save(&self, stamps: &HashMap<String, i64>) -> Result<(), String>;
}

/// Store backed by a JSON file in the engine data directory.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new() -> Self {
        Self {
            path: data_dir().join("reaction_cooldowns.json"),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownStore for JsonFileStore {
    fn load(&self) -> HashMap<String, i64> {
        load_json_config(&self.path, "Cooldown")
    }

    fn save(&self, stamps: &HashMap<String, i64>) -> Result<(), String> {
        save_json_config(&self.path, stamps, "Cooldown")
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    stamps: Mutex<HashMap<String, i64>>,
}

impl CooldownStore for MemoryStore {
    fn load(&self) -> HashMap<String, i64> {
        self.stamps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn save(&self, stamps: &HashMap<String, i64>) -> Result<(), String> {
        *self.stamps.lock().unwrap_or_else(|e| e.into_inner()) = stamps.clone();
        Ok(())
    }
}

// ── Cooldown Logic ─────────────────────────────────────────

pub struct ReactionCooldowns {
    store: Box<dyn CooldownStore>,
    stamps: HashMap<String, i64>,
}

fn normalize_key(subject: &str) -> String {
    subject.trim().to_lowercase()
}

impl ReactionCooldowns {
    pub fn new(store: Box<dyn CooldownStore>) -> Self {
        let stamps = store.load();
        Self { store, stamps }
    }

    /// True if the subject has no stamp yet or its cooldown window has
    /// elapsed.
    pub fn ready(&self, subject: &str, now_ms: i64) -> bool {
        match self.stamps.get(&normalize_key(subject)) {
            Some(last) => now_ms - last > REACTION_COOLDOWN_MS,
            None => true,
        }
    }

    /// Record a reaction for the subject and persist the stamp.
    pub fn stamp(&mut self, subject: &str, now_ms: i64) {
        self.stamps.insert(normalize_key(subject), now_ms);
        if let Err(e) = self.store.save(&self.stamps) {
            tracing::warn!("[Cooldown] Failed to persist stamps: {}", e);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
