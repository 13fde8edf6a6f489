//! Streamed chat protocol: incremental control-tag extraction, directive
//! hiding, client-command dispatch and the turn state machine.

pub mod command;
pub mod session;
pub mod tags;
pub mod transport;

#[cfg(test)]
mod tests;

pub use command::{
    parse_client_command, split_client_command, ClientCommand, CommandDispatcher,
    LoggingDispatcher, ScrollDirection, CLIENT_COMMAND_MARKER,
};
pub use session::{ChatMessage, ChatSession, Role, TurnPhase, CONNECTION_FAILED_NOTICE};
pub use tags::{extract_control_tags, visible_text, ResolvedTags};
pub use transport::{ChatRequest, ChatTransport, ChunkStream, HistoryMessage, HttpChatTransport};
