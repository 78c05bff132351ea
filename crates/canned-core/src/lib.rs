pub mod config;
pub mod constants;
pub mod conversation;
pub mod engine;
pub mod logging;
pub mod models;
pub mod preferences;
pub mod runtime;
pub mod store;
pub mod worker;

// Re-export the types most embedders need at the crate root
pub use config::CoreConfig;
pub use engine::{Outcome, ReplyEngine, SkipReason, Verdict};
pub use models::{FilledInput, NotificationEvent, ReplySender, ReplyTarget, SendError};
pub use preferences::{Preferences, PreferencesStorage};
pub use runtime::{EngineHandle, EngineRuntime};
pub use store::{Database, ReplyHistory, ReplyRecord};
pub use worker::EngineCommand;
