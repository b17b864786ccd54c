//! Transcript parsing: raw text in, an immutable conversation out.

use tally_core::models::{Conversation, Message};
use tracing::debug;

use crate::classifier::{classify, LineClass};

/// Parse decoded transcript text into a [`Conversation`].
///
/// Lines are classified one at a time; message-start lines open a record,
/// continuation lines append to the most recent record's body, and system
/// notices, blanks and orphan continuations (wrapped text before any message)
/// are dropped silently. Export formats drift across app versions, so a line
/// that fits no shape is never an error.
///
/// [`Conversation`]: tally_core::models::Conversation
pub fn parse_transcript(text: &str, title: impl Into<String>) -> Conversation {
    let mut messages: Vec<Message> = Vec::new();
    let mut system_notices = 0usize;
    let mut orphan_continuations = 0usize;

    for raw in text.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        match classify(line) {
            LineClass::Blank => {}
            LineClass::System { .. } => system_notices += 1,
            LineClass::MessageStart {
                timestamp,
                sender,
                text,
            } => {
                messages.push(Message {
                    timestamp,
                    sender: sender.to_string(),
                    text: text.to_string(),
                });
            }
            LineClass::Continuation { text } => match messages.last_mut() {
                Some(last) => {
                    last.text.push('\n');
                    last.text.push_str(text);
                }
                None => orphan_continuations += 1,
            },
        }
    }

    debug!(
        "parsed {} messages ({} system notices, {} orphan continuations dropped)",
        messages.len(),
        system_notices,
        orphan_continuations
    );

    Conversation::new(title, messages)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
