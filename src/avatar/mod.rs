pub mod autostate;
pub mod controller;
pub mod state;

pub use autostate::{auto_state, is_night, AmbientTheme, AutoState, TimeOfDay, WeatherClass};
pub use controller::{AvatarController, AvatarFrame, FrameInputs, MotionClip, PoseAnchor};
pub use state::{Action, AvatarState, Mood, PokeReaction, Vec3};
