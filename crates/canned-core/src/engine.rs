use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, trace, warn};

use crate::constants::MAX_NOTIFICATION_AGE_MS;
use crate::conversation::conversation_title;
use crate::models::notification::NotificationEvent;
use crate::models::reply::{FilledInput, ReplySender, ReplyTarget};
use crate::preferences::{Preferences, PreferencesStorage};
use crate::store::{ReplyHistory, ReplyRecord};

/// Decision for one notification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Reply,
    Skip(SkipReason),
}

/// Why an event was filtered instead of answered. Filtering is the normal
/// case, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ServiceDisabled,
    AppNotEnabled,
    Stale,
    GroupRepliesDisabled,
    RateLimited,
    NoReplyTarget,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ServiceDisabled => "service_disabled",
            SkipReason::AppNotEnabled => "app_not_enabled",
            SkipReason::Stale => "stale",
            SkipReason::GroupRepliesDisabled => "group_replies_disabled",
            SkipReason::RateLimited => "rate_limited",
            SkipReason::NoReplyTarget => "no_reply_target",
        }
    }
}

/// Result of running one event through the full pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A reply was recorded and handed to the sender.
    Replied {
        /// Correlation id of the dispatched reply target.
        reply_id: String,
        package: String,
        conversation_title: String,
    },
    /// The event was filtered; nothing happened.
    Skipped(SkipReason),
    /// The event was accepted but recording or sending failed. Terminal for
    /// this event only; the next event starts clean.
    Failed { message: String },
}

/// The decision-and-dispatch pipeline for incoming notifications.
///
/// Five predicates run in a fixed order, cheapest and most decisive first;
/// the first failure wins. On acceptance the reply is logged to history
/// before the sender is invoked, so a slow or failing send can never let a
/// second event for the same conversation slip through the rate limiter.
///
/// One preferences snapshot is taken per event; a concurrent settings
/// change cannot split a single evaluation.
pub struct ReplyEngine {
    prefs: PreferencesStorage,
    history: ReplyHistory,
    sender: Box<dyn ReplySender>,
}

impl ReplyEngine {
    pub fn new(
        prefs: PreferencesStorage,
        history: ReplyHistory,
        sender: Box<dyn ReplySender>,
    ) -> Self {
        Self {
            prefs,
            history,
            sender,
        }
    }

    /// Run the full pipeline for one event using the wall clock.
    pub fn handle(&self, event: &NotificationEvent) -> Outcome {
        self.handle_at(event, now_ms())
    }

    /// Decision only; no side effects beyond a history read.
    pub fn evaluate(&self, event: &NotificationEvent, now_ms: u64) -> Verdict {
        let prefs = self.prefs.snapshot();
        let title = conversation_title(event);
        match self.check(event, &prefs, &title, now_ms) {
            Ok(()) => Verdict::Reply,
            Err(reason) => Verdict::Skip(reason),
        }
    }

    /// Run the full pipeline for one event at the given time.
    pub fn handle_at(&self, event: &NotificationEvent, now_ms: u64) -> Outcome {
        let prefs = self.prefs.snapshot();
        let title = conversation_title(event);

        if let Err(reason) = self.check(event, &prefs, &title, now_ms) {
            trace!(
                "Filtered notification from {}: {}",
                event.package,
                reason.as_str()
            );
            return Outcome::Skipped(reason);
        }

        let Some(target) = ReplyTarget::from_event(event) else {
            // Transient or non-user notification ("checking for new
            // messages", "web session active") with nothing to fill in.
            trace!("No reply target in notification from {}", event.package);
            return Outcome::Skipped(SkipReason::NoReplyTarget);
        };

        self.dispatch(event, &prefs, title, target, now_ms)
    }

    fn check(
        &self,
        event: &NotificationEvent,
        prefs: &Preferences,
        title: &str,
        now_ms: u64,
    ) -> Result<(), SkipReason> {
        if !prefs.service_enabled {
            return Err(SkipReason::ServiceDisabled);
        }
        if !prefs.is_app_enabled(&event.package) {
            return Err(SkipReason::AppNotEnabled);
        }
        if !is_fresh(event.when, now_ms) {
            return Err(SkipReason::Stale);
        }
        if event.is_group_conversation() && !prefs.group_replies_enabled {
            return Err(SkipReason::GroupRepliesDisabled);
        }
        if !self.rate_limit_open(&event.package, title, prefs, now_ms) {
            return Err(SkipReason::RateLimited);
        }
        Ok(())
    }

    fn rate_limit_open(
        &self,
        package: &str,
        title: &str,
        prefs: &Preferences,
        now_ms: u64,
    ) -> bool {
        match self.history.last_reply_at(package, title) {
            Ok(Some(last)) => now_ms.saturating_sub(last) >= prefs.effective_reply_delay_ms(),
            Ok(None) => true,
            Err(e) => {
                // Unreadable history counts as inside the window.
                warn!("Failed to read reply history for {}: {:#}", package, e);
                false
            }
        }
    }

    fn dispatch(
        &self,
        event: &NotificationEvent,
        prefs: &Preferences,
        title: String,
        target: ReplyTarget,
        now_ms: u64,
    ) -> Outcome {
        let text = prefs.reply_text_or_default();
        // Every slot gets the same text; there is exactly one canned reply.
        let inputs: Vec<FilledInput> = target
            .remote_inputs
            .iter()
            .map(|input| FilledInput {
                key: input.result_key.clone(),
                text: text.to_string(),
            })
            .collect();

        let record = ReplyRecord {
            package: event.package.clone(),
            conversation_title: title.clone(),
            notified_at: event.when,
            reply_text: text.to_string(),
            replied_at: now_ms,
        };
        // Logged before the send: the log entry is what closes the rate
        // window, not the delivery.
        if let Err(e) = self.history.record_reply(&record) {
            warn!("Failed to record reply for {}: {:#}", event.package, e);
            return Outcome::Failed {
                message: format!("history write failed: {e:#}"),
            };
        }

        match self.sender.send_reply(&target, &inputs) {
            Ok(()) => {
                info!(
                    "Sent auto-reply {} to {} ({})",
                    target.id, event.package, title
                );
                Outcome::Replied {
                    reply_id: target.id,
                    package: event.package.clone(),
                    conversation_title: title,
                }
            }
            Err(e) => {
                warn!("Reply {} to {} failed: {}", target.id, event.package, e);
                Outcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Freshness gate. A `when` of zero means the posting app never set a
/// timestamp, which newer platforms hide by default; those count as fresh.
fn is_fresh(when: u64, now_ms: u64) -> bool {
    when == 0 || now_ms.saturating_sub(when) <= MAX_NOTIFICATION_AGE_MS
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
