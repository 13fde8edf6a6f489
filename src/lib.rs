//! Hikari Engine — headless core of a virtual companion client.
//!
//! Three subsystems: the streamed chat protocol (control-tag extraction,
//! directive hiding, client commands), the avatar behavior state machine
//! (mood/action/auto-state blended into per-frame presentation), and the
//! ambient reaction channel (vision greetings, phygital broadcasts). The
//! rendering shell embeds [`Engine`], forwards user input to
//! [`chat::ChatSession::run_turn`] and calls [`Engine::tick`] every frame.

pub mod avatar;
pub mod chat;
pub mod config;
pub mod error;
pub mod reaction;
pub mod speech;
pub mod utils;

use crate::avatar::{
    AmbientTheme, AvatarController, AvatarFrame, AvatarState, FrameInputs, PokeReaction, Vec3,
};
use crate::chat::{ChatSession, CommandDispatcher, HttpChatTransport};
use crate::config::EngineConfig;
use crate::reaction::{Greeter, JsonFileStore, ReactionCooldowns};
use crate::speech::{AudioSink, Speaker};
use chrono::Timelike;
use std::sync::{Arc, Mutex};

/// Wired-up engine core: shared persona state, the chat session, the speech
/// pathway and the per-frame controller.
pub struct Engine {
    pub avatar: Arc<AvatarState>,
    pub speaker: Arc<Speaker>,
    pub session: Arc<ChatSession>,
    pub theme: Arc<Mutex<AmbientTheme>>,
    controller: AvatarController,
    client: reqwest::Client,
    /// Analyze endpoint, present while the vision feature is enabled.
    vision_url: Option<String>,
    greeter: tokio::sync::Mutex<Greeter>,
}

impl Engine {
    pub fn new(
        config: &EngineConfig,
        dispatcher: Arc<dyn CommandDispatcher>,
        sink: Box<dyn AudioSink>,
    ) -> Self {
        let avatar = Arc::new(AvatarState::new());
        let speaker = Arc::new(Speaker::new(config.backend.speech_url.clone(), sink));
        let transport = Arc::new(HttpChatTransport::new(config.backend.chat_url.clone()));
        let session = Arc::new(ChatSession::new(
            transport,
            dispatcher,
            speaker.clone(),
            avatar.clone(),
        ));

        let vision_url = config
            .vision
            .enabled
            .then(|| config.vision.analyze_url.clone());
        let greeter = Greeter::new(ReactionCooldowns::new(Box::new(JsonFileStore::new())));

        Self {
            avatar,
            speaker,
            session,
            theme: Arc::new(Mutex::new(AmbientTheme::default())),
            controller: AvatarController::new(),
            client: reqwest::Client::new(),
            vision_url,
            greeter: tokio::sync::Mutex::new(greeter),
        }
    }

    /// Analyze a host-captured camera frame and speak any resulting
    /// greetings. A no-op while the vision feature is disabled.
    pub async fn react_to_frame(&self, frame: Vec<u8>) -> Result<(), String> {
        let Some(url) = &self.vision_url else {
            return Ok(());
        };
        let mut greeter = self.greeter.lock().await;
        greeter
            .react_to_frame(&self.client, url, frame, &self.speaker)
            .await
    }

    /// Handle a poke at a world-space hit point: the avatar glances at the
    /// touch, switches to the region's expression and speaks the reaction.
    pub fn poke(&self, point: Vec3) -> PokeReaction {
        let reaction = self.avatar.poke(point);
        self.avatar.set_mood(reaction.expression);
        let speaker = self.speaker.clone();
        let text = reaction.text.clone();
        tokio::spawn(async move { speaker.speak(&text).await });
        reaction
    }

    /// Advance the avatar by `dt` seconds and compute the presentation frame
    /// for the renderer.
    pub fn tick(&mut self, dt: f32) -> AvatarFrame {
        let inputs = FrameInputs {
            mood: self.avatar.mood(),
            action: self.avatar.action(),
            hour: chrono::Local::now().hour(),
            force_sleep: self.avatar.force_sleep(),
            setup_mode: self.avatar.setup_mode(),
            speaking: self.speaker.is_speaking(),
            gaze_override: self.avatar.gaze_override(),
        };
        self.controller.update(&inputs, dt)
    }
}
