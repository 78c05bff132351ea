use canned_core::NotificationEvent;
use serde::{Deserialize, Serialize};

/// Request from CLI client to daemon
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response from daemon to CLI client
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl Response {
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, code: &str, message: &str) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// CLI command parsed from arguments
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Start daemon in foreground
    Daemon,
    /// Get daemon status
    Status,
    /// Disable auto-replies globally
    Pause,
    /// Re-enable auto-replies globally
    Resume,
    /// List the packages auto-reply is enabled for
    Apps,
    /// Enable auto-replies for a package
    EnableApp { package: String },
    /// Disable auto-replies for a package
    DisableApp { package: String },
    /// Set the canned reply text
    SetMessage { text: String },
    /// Set the per-conversation reply delay in milliseconds
    SetDelay { delay_ms: u64 },
    /// Toggle replies to group conversations
    GroupReplies { enabled: bool },
    /// Dump the full preferences document
    Preferences,
    /// Show the reply log, newest first
    Log { limit: u32 },
    /// Feed one notification event through the pipeline
    Notify { event: NotificationEvent },
    /// Shutdown the daemon
    Shutdown,
}

impl CliCommand {
    /// Convert to a Request for sending to daemon
    pub fn to_request(&self, id: u64) -> Option<Request> {
        let (method, params) = match self {
            CliCommand::Daemon => return None, // Not sent to daemon
            CliCommand::Status => ("status", serde_json::json!({})),
            CliCommand::Pause => ("set_service_enabled", serde_json::json!({ "enabled": false })),
            CliCommand::Resume => ("set_service_enabled", serde_json::json!({ "enabled": true })),
            CliCommand::Apps => ("get_preferences", serde_json::json!({})),
            CliCommand::EnableApp { package } => {
                ("enable_app", serde_json::json!({ "package": package }))
            }
            CliCommand::DisableApp { package } => {
                ("disable_app", serde_json::json!({ "package": package }))
            }
            CliCommand::SetMessage { text } => {
                ("set_reply_text", serde_json::json!({ "text": text }))
            }
            CliCommand::SetDelay { delay_ms } => {
                ("set_reply_delay", serde_json::json!({ "delay_ms": delay_ms }))
            }
            CliCommand::GroupReplies { enabled } => {
                ("set_group_replies", serde_json::json!({ "enabled": enabled }))
            }
            CliCommand::Preferences => ("get_preferences", serde_json::json!({})),
            CliCommand::Log { limit } => {
                ("recent_replies", serde_json::json!({ "limit": limit }))
            }
            CliCommand::Notify { event } => ("notify", serde_json::json!({ "event": event })),
            CliCommand::Shutdown => ("shutdown", serde_json::json!({})),
        };

        Some(Request {
            id,
            method: method.to_string(),
            params,
        })
    }
}
