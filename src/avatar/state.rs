//! Shared persona state: persistent mood, transient action with dwell,
//! gaze point of interest, and manual overrides.
//!
//! Single-writer, multi-reader: the chat session writes mood/action while a
//! turn is streaming, interaction handlers write gaze/poke, and the frame
//! controller only reads. Action expiry is deadline math observed at read
//! time, so no background timer task is needed.

use crate::avatar::controller::MotionClip;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long an explicit action stays authoritative before the avatar
/// reverts to its auto-state motion. A superseding action restarts this.
pub const ACTION_DWELL: Duration = Duration::from_secs(5);

/// How long a poke-induced gaze target holds before snapping back.
pub const GAZE_HOLD: Duration = Duration::from_secs(2);

// ── Mood ───────────────────────────────────────────────────

/// Persistent facial mood. Survives across turns until replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Tired,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Neutral,
        Mood::Happy,
        Mood::Sad,
        Mood::Angry,
        Mood::Surprised,
        Mood::Tired,
    ];

    /// Parse a case-folded tag identifier. Unknown names are ignored
    /// (the tag is still stripped, but has no effect).
    pub fn from_name(name: &str) -> Option<Mood> {
        match name.trim().to_lowercase().as_str() {
            "neutral" => Some(Mood::Neutral),
            "happy" => Some(Mood::Happy),
            "sad" => Some(Mood::Sad),
            "angry" => Some(Mood::Angry),
            "surprised" => Some(Mood::Surprised),
            "tired" => Some(Mood::Tired),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mood::Neutral => "neutral",
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Angry => "angry",
            Mood::Surprised => "surprised",
            Mood::Tired => "tired",
        }
    }

    /// Index into fixed-size per-mood weight arrays.
    pub fn index(&self) -> usize {
        Mood::ALL.iter().position(|m| m == self).unwrap_or(0)
    }
}

// ── Action ─────────────────────────────────────────────────

/// Transient action triggered by a resolved `[ACTION: ...]` tag.
///
/// Procedural actions (bow, wave, nod, ...) are overlays that leave the base
/// motion clip playing; the clip actions (walking, dancing, sitting) replace
/// it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Bow,
    Shock,
    Gesticulate,
    Wave,
    Nod,
    Shake,
    Think,
    Knock,
    Walking,
    Dancing,
    Sitting,
}

impl Action {
    pub fn from_name(name: &str) -> Option<Action> {
        match name.trim().to_lowercase().as_str() {
            "bow" => Some(Action::Bow),
            "shock" => Some(Action::Shock),
            "gesticulate" => Some(Action::Gesticulate),
            "wave" => Some(Action::Wave),
            "nod" => Some(Action::Nod),
            "shake" => Some(Action::Shake),
            "think" => Some(Action::Think),
            "knock" => Some(Action::Knock),
            "walking" => Some(Action::Walking),
            "dancing" => Some(Action::Dancing),
            "sitting" => Some(Action::Sitting),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Bow => "bow",
            Action::Shock => "shock",
            Action::Gesticulate => "gesticulate",
            Action::Wave => "wave",
            Action::Nod => "nod",
            Action::Shake => "shake",
            Action::Think => "think",
            Action::Knock => "knock",
            Action::Walking => "walking",
            Action::Dancing => "dancing",
            Action::Sitting => "sitting",
        }
    }

    /// The motion clip this action plays, if it replaces the base motion.
    /// Procedural overlays return `None` so the base clip keeps playing.
    pub fn motion_clip(&self) -> Option<MotionClip> {
        match self {
            Action::Walking => Some(MotionClip::Walking),
            Action::Dancing => Some(MotionClip::Dancing),
            Action::Sitting => Some(MotionClip::Sitting),
            _ => None,
        }
    }
}

// ── Gaze ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Default gaze target, approximating the viewer's position.
pub const DEFAULT_GAZE: Vec3 = Vec3::new(0.0, 1.3, 5.0);

/// Reaction produced by poking the avatar.
#[derive(Debug, Clone, Serialize)]
pub struct PokeReaction {
    pub text: String,
    pub expression: Mood,
}

// ── Shared State ───────────────────────────────────────────

struct ActionCell {
    action: Action,
    expires_at: Instant,
}

struct GazeCell {
    target: Vec3,
    expires_at: Instant,
}

struct Inner {
    mood: Mood,
    action: Option<ActionCell>,
    gaze: Option<GazeCell>,
    force_sleep: bool,
    setup_mode: bool,
}

/// Process-wide persona state, read every frame by the controller.
pub struct AvatarState {
    inner: Mutex<Inner>,
}

impl Default for AvatarState {
    fn default() -> Self {
        Self::new()
    }
}

impl AvatarState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                mood: Mood::Neutral,
                action: None,
                gaze: None,
                force_sleep: false,
                setup_mode: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn mood(&self) -> Mood {
        self.lock().mood
    }

    pub fn set_mood(&self, mood: Mood) {
        tracing::info!("[Avatar] Mood set: {}", mood.name());
        self.lock().mood = mood;
    }

    /// Set the transient action and (re)start its dwell window.
    pub fn set_action(&self, action: Action) {
        tracing::info!("[Avatar] Action triggered: {}", action.name());
        self.lock().action = Some(ActionCell {
            action,
            expires_at: Instant::now() + ACTION_DWELL,
        });
    }

    /// Current action, or `None` once the dwell window has lapsed.
    pub fn action(&self) -> Option<Action> {
        self.action_at(Instant::now())
    }

    pub fn action_at(&self, now: Instant) -> Option<Action> {
        let mut inner = self.lock();
        if let Some(cell) = &inner.action {
            if now >= cell.expires_at {
                inner.action = None;
            }
        }
        inner.action.as_ref().map(|c| c.action)
    }

    pub fn force_sleep(&self) -> bool {
        self.lock().force_sleep
    }

    pub fn set_force_sleep(&self, on: bool) {
        self.lock().force_sleep = on;
    }

    pub fn setup_mode(&self) -> bool {
        self.lock().setup_mode
    }

    /// Placement-adjustment mode: gaze tracking is suppressed while active.
    pub fn set_setup_mode(&self, on: bool) {
        self.lock().setup_mode = on;
    }

    /// Transient gaze point of interest, or `None` once it has expired
    /// back to the default viewer target.
    pub fn gaze_override(&self) -> Option<Vec3> {
        self.gaze_override_at(Instant::now())
    }

    pub fn gaze_override_at(&self, now: Instant) -> Option<Vec3> {
        let mut inner = self.lock();
        if let Some(cell) = &inner.gaze {
            if now >= cell.expires_at {
                inner.gaze = None;
            }
        }
        inner.gaze.as_ref().map(|c| c.target)
    }

    /// Handle a poke at a world-space hit point. Sets the gaze target for a
    /// short hold and returns the spoken reaction for the touched region.
    pub fn poke(&self, point: Vec3) -> PokeReaction {
        {
            let mut inner = self.lock();
            inner.gaze = Some(GazeCell {
                target: point,
                expires_at: Instant::now() + GAZE_HOLD,
            });
        }

        if point.y > 1.45 {
            PokeReaction {
                text: "Hey, nicht die Frisur!".to_string(),
                expression: Mood::Angry,
            }
        } else if point.y > 1.0 {
            PokeReaction {
                text: "Bin ich dick?".to_string(),
                expression: Mood::Surprised,
            }
        } else {
            PokeReaction {
                text: "Huch!".to_string(),
                expression: Mood::Happy,
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
