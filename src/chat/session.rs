//! Chat session: drives one turn from user input through the streamed
//! response to the finalized utterance.
//!
//! Turn lifecycle: pending → streaming → resolved | failed. Each turn gets a
//! fresh id; a superseding turn (or an explicit cancel) makes the old read
//! loop's remaining chunks no-ops, so a stale completion never mutates the
//! transcript or avatar state.

use crate::avatar::AvatarState;
use crate::chat::command::{split_client_command, CommandDispatcher};
use crate::chat::tags::{extract_control_tags, visible_text};
use crate::chat::transport::{ChatRequest, ChatTransport, HistoryMessage};
use crate::speech::Speaker;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Shown in place of the bot message when the stream fails before any
/// content arrived.
pub const CONNECTION_FAILED_NOTICE: &str = "Error: Connection failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Terminal phase of one turn as reported by [`ChatSession::run_turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// The turn never started (empty input).
    Pending,
    /// The turn was superseded or cancelled mid-stream.
    Streaming,
    Resolved,
    Failed,
}

// ── Session ────────────────────────────────────────────────

pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    dispatcher: Arc<dyn CommandDispatcher>,
    speaker: Arc<Speaker>,
    avatar: Arc<AvatarState>,
    messages: Mutex<Vec<ChatMessage>>,
    active_turn: Mutex<Option<Uuid>>,
}

impl ChatSession {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        dispatcher: Arc<dyn CommandDispatcher>,
        speaker: Arc<Speaker>,
        avatar: Arc<AvatarState>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            speaker,
            avatar,
            messages: Mutex::new(Vec::new()),
            active_turn: Mutex::new(None),
        }
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.lock_messages().clone()
    }

    /// Abandon the in-flight turn, if any. Its read loop stops writing to
    /// shared state at the next chunk.
    pub fn cancel_active_turn(&self) {
        *self.lock_active() = None;
    }

    fn lock_messages(&self) -> std::sync::MutexGuard<'_, Vec<ChatMessage>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<Uuid>> {
        self.active_turn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_active(&self, turn: Uuid) -> bool {
        *self.lock_active() == Some(turn)
    }

    fn set_placeholder(&self, index: usize, content: String) {
        if let Some(message) = self.lock_messages().get_mut(index) {
            message.content = content;
        }
    }

    /// Run one turn to completion. Side effects: transcript updates, avatar
    /// mood/action updates, command dispatch, speech. Returns the phase the
    /// turn ended in; failures are local and leave the session usable.
    pub async fn run_turn(&self, user_text: &str) -> TurnPhase {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return TurnPhase::Pending;
        }

        let turn = Uuid::new_v4();
        *self.lock_active() = Some(turn);

        // The request carries the transcript as it was before this turn.
        let history: Vec<HistoryMessage> = self
            .lock_messages()
            .iter()
            .map(|m| HistoryMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();

        let placeholder = {
            let mut messages = self.lock_messages();
            messages.push(ChatMessage {
                role: Role::User,
                content: user_text.to_string(),
            });
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: String::new(),
            });
            messages.len() - 1
        };

        let request = ChatRequest {
            message: user_text.to_string(),
            history,
        };

        let mut stream = match self.transport.open_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("[Chat] Failed to open stream: {}", e);
                if self.is_active(turn) {
                    self.set_placeholder(placeholder, CONNECTION_FAILED_NOTICE.to_string());
                }
                return TurnPhase::Failed;
            }
        };

        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            if !self.is_active(turn) {
                return TurnPhase::Streaming;
            }
            match chunk {
                Ok(text) => {
                    buffer.push_str(&text);
                    let tags = extract_control_tags(&mut buffer);
                    if let Some(mood) = tags.mood {
                        self.avatar.set_mood(mood);
                    }
                    if let Some(action) = tags.action {
                        self.avatar.set_action(action);
                    }
                    self.set_placeholder(placeholder, visible_text(&buffer));
                }
                Err(e) => {
                    tracing::warn!("[Chat] Stream read failed: {}", e);
                    // Keep partial content; only an empty placeholder gets
                    // replaced by the failure notice.
                    if visible_text(&buffer).is_empty() {
                        self.set_placeholder(placeholder, CONNECTION_FAILED_NOTICE.to_string());
                    }
                    return TurnPhase::Failed;
                }
            }
        }

        if !self.is_active(turn) {
            return TurnPhase::Streaming;
        }

        let (_, command) = split_client_command(&buffer);
        let utterance = visible_text(&buffer);

        self.set_placeholder(placeholder, utterance.clone());
        self.dispatcher.dispatch(command);

        if !utterance.is_empty() {
            let speaker = self.speaker.clone();
            tokio::spawn(async move {
                speaker.speak(&utterance).await;
            });
        }

        TurnPhase::Resolved
    }
}
