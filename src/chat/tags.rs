//! Control-tag extraction from the streamed response buffer.
//!
//! The backend interleaves markup with the spoken text:
//!   - `[ACTION: <name>]` / `[MOOD: <name>]` — avatar triggers, case-insensitive
//!   - `EXECUTE: ...` — server-side directive line, hidden from the user
//!   - `EXECUTE_CLIENT:...` — client command; everything after the marker is
//!     payload and never visible text
//!
//! Tags arrive split across arbitrary chunk boundaries, so extraction always
//! re-scans the full buffer, and the display projection holds back any tail
//! that could still grow into a tag or marker.

use crate::avatar::{Action, Mood};
use crate::chat::command::CLIENT_COMMAND_MARKER;

const ACTION_TAG_PREFIX: &str = "[ACTION:";
const MOOD_TAG_PREFIX: &str = "[MOOD:";

/// Server-side directive marker; the rest of the line is hidden, not parsed.
pub const DIRECTIVE_MARKER: &str = "EXECUTE:";

/// Tags newly resolved by one extraction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTags {
    pub action: Option<Action>,
    pub mood: Option<Mood>,
}

#[derive(Clone, Copy)]
enum TagKind {
    Action,
    Mood,
}

struct TagSpan {
    start: usize,
    end: usize,
    name_start: usize,
    name_end: usize,
}

/// Try to match a complete `[KIND: name]` tag at byte offset `start`.
/// The kind is matched case-insensitively; the name is a non-empty run of
/// word characters, optionally preceded by blanks.
fn match_tag_at(bytes: &[u8], start: usize, prefix: &[u8]) -> Option<TagSpan> {
    if bytes.len() < start + prefix.len() {
        return None;
    }
    if !bytes[start..start + prefix.len()].eq_ignore_ascii_case(prefix) {
        return None;
    }
    let mut i = start + prefix.len();
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    if i < bytes.len() && bytes[i] == b']' {
        Some(TagSpan {
            start,
            end: i + 1,
            name_start,
            name_end: i,
        })
    } else {
        None
    }
}

/// Leftmost complete tag of the given kind in `text`, if any.
fn find_tag(text: &str, prefix: &str) -> Option<TagSpan> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while let Some(off) = text[pos..].find('[') {
        let start = pos + off;
        if let Some(span) = match_tag_at(bytes, start, prefix.as_bytes()) {
            return Some(span);
        }
        pos = start + 1;
    }
    None
}

/// Strip every complete control tag from `buffer` and report the latest
/// resolved value per kind. Tags are consumed leftmost-first, so each fires
/// exactly once per turn; within one pass a later tag of the same kind
/// supersedes the earlier one. Unknown tag names are stripped but have no
/// effect. Text past the client-command marker is payload and never scanned.
pub fn extract_control_tags(buffer: &mut String) -> ResolvedTags {
    let mut resolved = ResolvedTags::default();

    loop {
        let scan_end = buffer.find(CLIENT_COMMAND_MARKER).unwrap_or(buffer.len());
        let region = &buffer[..scan_end];

        let action = find_tag(region, ACTION_TAG_PREFIX).map(|s| (s, TagKind::Action));
        let mood = find_tag(region, MOOD_TAG_PREFIX).map(|s| (s, TagKind::Mood));

        let next = match (action, mood) {
            (Some(a), Some(m)) => Some(if a.0.start <= m.0.start { a } else { m }),
            (a, m) => a.or(m),
        };

        let Some((span, kind)) = next else { break };
        let name = buffer[span.name_start..span.name_end].to_string();
        buffer.replace_range(span.start..span.end, "");

        match kind {
            TagKind::Action => {
                if let Some(action) = Action::from_name(&name) {
                    resolved.action = Some(action);
                }
            }
            TagKind::Mood => {
                if let Some(mood) = Mood::from_name(&name) {
                    resolved.mood = Some(mood);
                }
            }
        }
    }

    resolved
}

/// True if `suffix` (starting at a `[`) could still grow into a complete tag
/// of the given kind once more bytes arrive.
fn could_become_tag(suffix: &[u8], prefix: &[u8]) -> bool {
    if suffix.len() < prefix.len() {
        return prefix[..suffix.len()].eq_ignore_ascii_case(suffix);
    }
    if !suffix[..prefix.len()].eq_ignore_ascii_case(prefix) {
        return false;
    }
    let mut i = prefix.len();
    while i < suffix.len() && (suffix[i] == b' ' || suffix[i] == b'\t') {
        i += 1;
    }
    while i < suffix.len() && (suffix[i].is_ascii_alphanumeric() || suffix[i] == b'_') {
        i += 1;
    }
    // Consumed the whole suffix: the closing bracket just hasn't arrived yet.
    // Anything left over means the run was invalidated and can be shown.
    i == suffix.len()
}

/// Byte position up to which it is safe to show text: holds back a trailing
/// run that could still become a control tag.
fn find_safe_emit_boundary(text: &str) -> usize {
    if let Some(last_bracket) = text.rfind('[') {
        let suffix = text[last_bracket..].as_bytes();
        if could_become_tag(suffix, ACTION_TAG_PREFIX.as_bytes())
            || could_become_tag(suffix, MOOD_TAG_PREFIX.as_bytes())
        {
            return last_bracket;
        }
    }
    text.len()
}

/// Byte position up to which it is safe to show text: holds back a trailing
/// run that is a prefix of a directive or client-command marker.
fn marker_holdback(text: &str) -> usize {
    let bytes = text.as_bytes();
    let max = CLIENT_COMMAND_MARKER.len().min(bytes.len());
    for take in (1..=max).rev() {
        let suffix = &bytes[bytes.len() - take..];
        if CLIENT_COMMAND_MARKER.as_bytes().starts_with(suffix)
            || DIRECTIVE_MARKER.as_bytes().starts_with(suffix)
        {
            return bytes.len() - take;
        }
    }
    text.len()
}

/// Project the accumulated buffer into user-visible text: cut at the
/// client-command marker, remove directive lines and complete control tags,
/// and hold back any tail that could still grow into markup.
pub fn visible_text(buffer: &str) -> String {
    // Everything after the client-command marker is payload, never shown.
    let cut = buffer.find(CLIENT_COMMAND_MARKER).unwrap_or(buffer.len());
    let mut out = buffer[..cut].to_string();

    // Complete control tags (already consumed from the live buffer by
    // extraction, but this projection must stand on its own).
    while let Some(span) = find_tag(&out, ACTION_TAG_PREFIX).or_else(|| find_tag(&out, MOOD_TAG_PREFIX)) {
        out.replace_range(span.start..span.end, "");
    }

    // Directive lines: from the marker through end of line.
    while let Some(pos) = out.find(DIRECTIVE_MARKER) {
        let line_end = out[pos..].find('\n').map(|i| pos + i + 1).unwrap_or(out.len());
        out.replace_range(pos..line_end, "");
    }

    // Hold back partial markup at the tail. Each truncation can expose a new
    // suspicious tail, so iterate to a fixpoint.
    loop {
        let len = out.len();
        out.truncate(find_safe_emit_boundary(&out));
        out.truncate(marker_holdback(&out));
        if out.len() == len {
            break;
        }
    }

    out.trim().to_string()
}

// ── Tests ──────────────────────────────────────────────────
