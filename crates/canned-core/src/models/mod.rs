pub mod notification;
pub mod reply;

pub use notification::{NotificationAction, NotificationEvent, RemoteInput};
pub use reply::{FilledInput, ReplySender, ReplyTarget, SendError};
