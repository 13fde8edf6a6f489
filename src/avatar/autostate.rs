//! Autonomous resting state and ambient theme.
//!
//! The auto-state is derived purely from wall-clock time of day plus the
//! manual sleep override; it is recomputed continuously and never persisted.

use serde::{Deserialize, Serialize};

/// The avatar's default posture when no explicit action is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoState {
    /// Transient startup value; resolves to sitting (there is no standing
    /// resting pose).
    Idle,
    Sitting,
    Sleeping,
}

/// Night window: before 06:00 or at/after 22:00.
pub fn is_night(hour: u32) -> bool {
    hour < 6 || hour >= 22
}

/// Derive the auto-state for the given local hour.
pub fn auto_state(hour: u32, force_sleep: bool) -> AutoState {
    if force_sleep || is_night(hour) {
        AutoState::Sleeping
    } else {
        AutoState::Sitting
    }
}

// ── Ambient Theme ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Day,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> TimeOfDay {
        if is_night(hour) {
            TimeOfDay::Night
        } else if hour < 11 {
            TimeOfDay::Morning
        } else if hour < 18 {
            TimeOfDay::Day
        } else {
            TimeOfDay::Evening
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherClass {
    Clear,
    Cloudy,
    Rain,
    Snow,
    Fog,
}

impl WeatherClass {
    /// Map a WMO weather code (as served by open-meteo) to a render class.
    pub fn from_code(code: u16) -> WeatherClass {
        match code {
            0 | 1 => WeatherClass::Clear,
            2 | 3 => WeatherClass::Cloudy,
            51 | 53 | 55 | 61 | 63 | 65 | 80 | 81 | 82 => WeatherClass::Rain,
            71 | 73 | 75 | 85 | 86 => WeatherClass::Snow,
            45 | 48 => WeatherClass::Fog,
            _ => WeatherClass::Cloudy,
        }
    }
}

/// Environment theme fed to the renderer; temperature is also refreshed
/// from the ambient sensor poll when a valid reading arrives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmbientTheme {
    pub time_of_day: TimeOfDay,
    pub weather: WeatherClass,
    pub temperature: f32,
}

impl Default for AmbientTheme {
    fn default() -> Self {
        Self {
            time_of_day: TimeOfDay::Day,
            weather: WeatherClass::Clear,
            temperature: 20.0,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
