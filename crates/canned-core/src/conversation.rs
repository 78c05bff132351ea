//! Conversation identity derivation.
//!
//! Rate limiting is keyed by (package, conversation title), and the title is
//! the only stable handle the platform exposes. For group conversations it
//! arrives mangled by preview formatting, so two heuristic repairs are
//! applied. The truncation rules are literal platform behavior: sender
//! previews put the sender name before the first `:`, and unread counts are
//! appended as a trailing parenthesized suffix.

use crate::models::notification::NotificationEvent;

/// Derive the conversation title used as the rate-limit key.
///
/// Rules, in order:
/// - Non-group notifications use the plain title verbatim.
/// - Group notifications prefer the hidden conversation title when present
///   and non-empty.
/// - Otherwise the plain title is cut at the first `:` (sender prefix).
/// - When the event embeds more than one message, a trailing `(…)` unread
///   count is cut at the last `(`.
///
/// Missing titles degrade to an empty string; an empty key is still a key.
///
/// # Examples
/// ```
/// use canned_core::conversation::conversation_title;
/// use canned_core::models::NotificationEvent;
///
/// let group = NotificationEvent::new("com.whatsapp")
///     .with_group_conversation(true)
///     .with_title("Alice: hello");
/// assert_eq!(conversation_title(&group), "Alice");
///
/// let direct = NotificationEvent::new("com.whatsapp").with_title("Alice: hello");
/// assert_eq!(conversation_title(&direct), "Alice: hello");
/// ```
pub fn conversation_title(event: &NotificationEvent) -> String {
    if !event.is_group_conversation() {
        return event.title().unwrap_or_default().to_string();
    }

    let mut title = match event.hidden_conversation_title() {
        Some(hidden) if !hidden.is_empty() => hidden.to_string(),
        _ => strip_sender_prefix(event.title().unwrap_or_default()),
    };

    // More than one embedded message means the preview title may carry an
    // unread-count suffix like "Team Chat (3)".
    if event.message_count() > 1 {
        if let Some(start) = title.rfind('(') {
            title.truncate(start);
        }
    }

    title
}

/// Cut a group preview title at the first `:`; group previews are often
/// "Sender: message" one-liners.
fn strip_sender_prefix(title: &str) -> String {
    match title.find(':') {
        Some(index) => title[..index].to_string(),
        None => title.to_string(),
    }
}
