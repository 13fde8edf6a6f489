//! Per-frame avatar controller.
//!
//! Blends the persistent mood, the transient action, the time-derived
//! auto-state and the speaking flag into one coherent frame: motion clip,
//! facial expression weights, blink, lip-sync amplitude and gaze target.
//! Updated once per rendered frame with a delta-time parameter so there are
//! no hidden recomputation order dependencies.

use crate::avatar::autostate::{auto_state, AutoState};
use crate::avatar::state::{Action, Mood, Vec3, DEFAULT_GAZE};
use rand::Rng;
use serde::Serialize;

/// Exponential smoothing rate for expression cross-fades.
const EXPRESSION_FADE_RATE: f32 = 5.0;

/// Target intensity of the active mood expression while awake.
const MOOD_INTENSITY: f32 = 0.5;

/// How long the eyes stay shut during a blink.
const BLINK_HOLD_SECS: f32 = 0.1;

/// Angular frequency of the mock lip-sync oscillator.
const LIP_SYNC_RATE: f32 = 20.0;

// ── Frame Types ────────────────────────────────────────────

/// Playable base motion clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionClip {
    Sitting,
    Sleeping,
    Walking,
    Dancing,
}

/// Where the model is anchored in the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseAnchor {
    Chair,
    Bed,
}

/// Everything the controller reads for one tick. Assembled from the shared
/// state by the engine; plain values so the controller stays pure.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    pub mood: Mood,
    pub action: Option<Action>,
    /// Local hour of day (0-23).
    pub hour: u32,
    pub force_sleep: bool,
    pub setup_mode: bool,
    /// True while audio playback of the current utterance is active.
    pub speaking: bool,
    /// Transient gaze point of interest, if one is held.
    pub gaze_override: Option<Vec3>,
}

/// One computed presentation frame.
#[derive(Debug, Clone, Serialize)]
pub struct AvatarFrame {
    pub motion: MotionClip,
    pub anchor: PoseAnchor,
    /// Per-mood expression blend weights, eased across frames.
    pub expressions: Vec<(Mood, f32)>,
    /// 1.0 = eyes fully closed.
    pub blink: f32,
    /// Mouth-open amplitude in [0, 1].
    pub mouth_open: f32,
    /// Gaze target, or `None` while gaze tracking is suppressed.
    pub gaze: Option<Vec3>,
    pub sleeping: bool,
}

fn lerp(current: f32, target: f32, t: f32) -> f32 {
    current + (target - current) * t.clamp(0.0, 1.0)
}

// ── Controller ─────────────────────────────────────────────

pub struct AvatarController {
    elapsed: f32,
    weights: [f32; Mood::ALL.len()],
    blink_timer: f32,
    next_blink: f32,
}

impl Default for AvatarController {
    fn default() -> Self {
        Self::new()
    }
}

impl AvatarController {
    pub fn new() -> Self {
        Self {
            elapsed: 0.0,
            weights: [0.0; Mood::ALL.len()],
            blink_timer: 0.0,
            next_blink: draw_blink_interval(),
        }
    }

    /// Advance the controller by `dt` seconds and compute the frame.
    pub fn update(&mut self, inputs: &FrameInputs, dt: f32) -> AvatarFrame {
        self.elapsed += dt;

        let auto = auto_state(inputs.hour, inputs.force_sleep);
        let sleeping = auto == AutoState::Sleeping;

        // 1. Motion: an action with a playable clip overrides the auto-state
        //    motion entirely; procedural overlays leave the base clip alone.
        let base_motion = match auto {
            AutoState::Sleeping => MotionClip::Sleeping,
            AutoState::Sitting | AutoState::Idle => MotionClip::Sitting,
        };
        let motion = inputs
            .action
            .and_then(|a| a.motion_clip())
            .unwrap_or(base_motion);
        let anchor = if sleeping {
            PoseAnchor::Bed
        } else {
            PoseAnchor::Chair
        };

        // 2. Expression cross-fade: the active mood eases toward its target
        //    intensity, everything else eases toward zero. Never snaps.
        let target = if sleeping { 0.0 } else { MOOD_INTENSITY };
        let t = EXPRESSION_FADE_RATE * dt;
        for (i, mood) in Mood::ALL.iter().enumerate() {
            let goal = if *mood == inputs.mood { target } else { 0.0 };
            self.weights[i] = lerp(self.weights[i], goal, t);
        }

        // 3. Blink
        let blink = if sleeping {
            1.0
        } else {
            self.blink_timer += dt;
            if self.blink_timer > self.next_blink {
                if self.blink_timer > self.next_blink + BLINK_HOLD_SECS {
                    self.blink_timer = 0.0;
                    self.next_blink = draw_blink_interval();
                    0.0
                } else {
                    1.0
                }
            } else {
                0.0
            }
        };

        // 4. Lip sync: smooth periodic stand-in for an audio envelope.
        let mouth_open = if inputs.speaking && !sleeping {
            (self.elapsed * LIP_SYNC_RATE).sin() * 0.5 + 0.5
        } else {
            0.0
        };

        // 5. Gaze
        let gaze = if sleeping || inputs.setup_mode {
            None
        } else {
            Some(inputs.gaze_override.unwrap_or(DEFAULT_GAZE))
        };

        AvatarFrame {
            motion,
            anchor,
            expressions: Mood::ALL
                .iter()
                .enumerate()
                .map(|(i, m)| (*m, self.weights[i]))
                .collect(),
            blink,
            mouth_open,
            gaze,
            sleeping,
        }
    }

    /// Current eased weight of one mood expression.
    pub fn weight(&self, mood: Mood) -> f32 {
        self.weights[mood.index()]
    }
}

/// Uniform random blink interval in [2s, 5s).
fn draw_blink_interval() -> f32 {
    rand::thread_rng().gen_range(2.0..5.0)
}

// ── Tests ──────────────────────────────────────────────────
