//! Client-command directives.
//!
//! The backend can end a response with `EXECUTE_CLIENT:<payload>`; everything
//! after the marker is machine payload, parsed by literal prefix into a
//! closed command set. Unrecognized payloads degrade to `None`, never error.

/// Literal marker. Case-sensitive; the remainder of the stream is payload.
pub const CLIENT_COMMAND_MARKER: &str = "EXECUTE_CLIENT:";

/// Fraction of the viewport height covered by one scroll command.
pub const SCROLL_VIEWPORT_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Fully parsed client command. `None` means "no effect", used both for the
/// no-marker case and for malformed payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    OpenUrl(String),
    Scroll(ScrollDirection),
    Reload,
    Alert(String),
    None,
}

/// Parse a command payload (the text after the marker) by literal prefix.
pub fn parse_client_command(payload: &str) -> ClientCommand {
    let payload = payload.trim();

    if let Some(url) = payload.strip_prefix("open_url|") {
        return ClientCommand::OpenUrl(url.trim().to_string());
    }
    if payload == "scroll" || payload.starts_with("scroll|") {
        let direction = match payload.splitn(2, '|').nth(1).map(str::trim) {
            Some("up") => ScrollDirection::Up,
            // Unrecognized or missing direction scrolls down
            _ => ScrollDirection::Down,
        };
        return ClientCommand::Scroll(direction);
    }
    if payload.starts_with("reload") {
        return ClientCommand::Reload;
    }
    if let Some(message) = payload.strip_prefix("alert|") {
        return ClientCommand::Alert(message.trim().to_string());
    }

    ClientCommand::None
}

/// Split an assembled response at the command marker. Returns the spoken-text
/// candidate and the parsed command (`None` when no marker is present).
pub fn split_client_command(text: &str) -> (&str, ClientCommand) {
    match text.find(CLIENT_COMMAND_MARKER) {
        Some(pos) => {
            let payload = &text[pos + CLIENT_COMMAND_MARKER.len()..];
            (&text[..pos], parse_client_command(payload))
        }
        None => (text, ClientCommand::None),
    }
}

// ── Dispatch ───────────────────────────────────────────────

/// Executes client commands. Dispatch is side-effecting only and never
/// fails; implementations swallow their own errors.
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, command: ClientCommand);
}

/// Headless dispatcher: records the command in the log. The embedding shell
/// supplies a real one that drives its viewport.
#[derive(Debug, Default)]
pub struct LoggingDispatcher;

impl CommandDispatcher for LoggingDispatcher {
    fn dispatch(&self, command: ClientCommand) {
        match command {
            ClientCommand::OpenUrl(url) => {
                if !url.is_empty() {
                    tracing::info!("[Command] open_url: {}", url);
                }
            }
            ClientCommand::Scroll(direction) => {
                tracing::info!(
                    "[Command] scroll {:?} by {:.0}% of viewport",
                    direction,
                    SCROLL_VIEWPORT_FRACTION * 100.0
                );
            }
            ClientCommand::Reload => tracing::info!("[Command] reload"),
            ClientCommand::Alert(message) => tracing::info!("[Command] alert: {}", message),
            ClientCommand::None => {}
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
