use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::notification::{NotificationEvent, RemoteInput};

/// The actionable reply path extracted from one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    /// Fresh correlation id for logs and the bridge protocol.
    pub id: String,
    /// Package the reply goes back to.
    pub package: String,
    /// Handle of the action to fire once the inputs are filled.
    pub action_id: String,
    /// Every input slot collected across the notification's actions.
    pub remote_inputs: Vec<RemoteInput>,
}

impl ReplyTarget {
    /// Collect the reply capability from a notification's declared actions.
    ///
    /// Slots are merged across all slot-bearing actions; the action id of
    /// the last one encountered is the one fired. Returns `None` when no
    /// action declares any input slot, which is the normal outcome for
    /// transient status notifications ("checking for new messages" and the
    /// like), not an error.
    pub fn from_event(event: &NotificationEvent) -> Option<Self> {
        let mut remote_inputs = Vec::new();
        let mut action_id: Option<&str> = None;

        for action in &event.actions {
            for input in &action.remote_inputs {
                remote_inputs.push(input.clone());
                action_id = Some(&action.action_id);
            }
        }

        Some(Self {
            id: Uuid::new_v4().to_string(),
            package: event.package.clone(),
            action_id: action_id?.to_string(),
            remote_inputs,
        })
    }
}

/// One filled slot of an outgoing reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilledInput {
    pub key: String,
    pub text: String,
}

/// Why a filled reply could not be handed over for delivery.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The origin notification was dismissed or expired while we decided.
    #[error("reply action is no longer valid: {message}")]
    ActionInvalid { message: String },
    /// Nobody is listening for outgoing replies.
    #[error("reply channel is closed")]
    ChannelClosed,
    #[error("timed out handing the reply over for delivery")]
    Timeout,
}

/// Delivery seam for outgoing replies.
///
/// The engine fills the slots and hands them over; performing the action
/// belongs to the host environment. The daemon's implementation queues the
/// payload for its bridge, tests record it. Failures are reported once and
/// never retried.
pub trait ReplySender: Send {
    fn send_reply(&self, target: &ReplyTarget, inputs: &[FilledInput]) -> Result<(), SendError>;
}
