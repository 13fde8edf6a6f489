//! Ambient reaction channel: vision-detection greetings with a persistent
//! per-subject cooldown, and the polled phygital state / broadcast path.

pub mod broadcast;
pub mod cooldown;
pub mod greeter;

pub use broadcast::{BroadcastEvent, BroadcastFilter, PhygitalPoller, PhygitalState};
pub use cooldown::{
    CooldownStore, JsonFileStore, MemoryStore, ReactionCooldowns, REACTION_COOLDOWN_MS,
    UNKNOWN_GUEST_KEY,
};
pub use greeter::{analyze_frame, DetectionEvent, Greeter};
