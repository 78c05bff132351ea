//! Application-wide constants
//!
//! Centralized location for magic strings and timing values that are
//! used across multiple modules.

/// Minimum gap between two automatic replies to the same conversation, in
/// milliseconds. Consecutive notifications from the same person or group
/// inside this window are never answered again, so two auto-responders
/// talking to each other cannot loop.
pub const REPLY_DELAY_FLOOR_MS: u64 = 10 * 1000;

/// Maximum age of a notification's own timestamp for it to still be
/// answered. Messaging apps repost the previous notification when a new
/// message arrives in the same thread; anything older than this is a
/// repost, not a new message.
pub const MAX_NOTIFICATION_AGE_MS: u64 = 2 * 60 * 1000;

/// Reply text used when the preferences document does not set one.
pub const DEFAULT_REPLY_TEXT: &str =
    "I'm away right now. I'll get back to you as soon as I can. (autoreply)";

/// Data directory used when none is configured.
pub const DEFAULT_DATA_DIR: &str = "canned_data";

/// File name of the SQLite reply log inside the data directory.
pub const HISTORY_DB_FILE: &str = "reply-log.sqlite3";

/// File name of the preferences document inside the data directory.
pub const PREFERENCES_FILE: &str = "preferences.json";

// Metadata keys mirrored from the platform notification extras bundle
pub mod extras {
    /// Plain notification title (contact or group name, possibly mangled
    /// by preview formatting).
    pub const TITLE: &str = "android.title";
    /// Boolean flag marking a group conversation.
    pub const IS_GROUP_CONVERSATION: &str = "android.isGroupConversation";
    /// Unmangled group name, present on some platform versions.
    pub const HIDDEN_CONVERSATION_TITLE: &str = "android.hiddenConversationTitle";
    /// Embedded per-message list for grouped previews.
    pub const MESSAGES: &str = "android.messages";
}
