use std::sync::mpsc::{Receiver, Sender};

use tracing::debug;

use crate::engine::{Outcome, ReplyEngine};
use crate::models::notification::NotificationEvent;

/// Commands consumed by the reply worker thread.
pub enum EngineCommand {
    /// Run one notification through the pipeline. The outcome is reported
    /// back when a response channel is attached; senders that only want the
    /// side effects can leave it out.
    Notification {
        event: NotificationEvent,
        response_tx: Option<Sender<Outcome>>,
    },
    Shutdown,
}

/// Single serialized worker owning the engine.
///
/// Every event is processed fully (decision, extraction, history write,
/// send) before the next one is taken off the channel, so two events for
/// the same conversation can never race the rate-limit check.
pub struct ReplyWorker {
    engine: ReplyEngine,
    command_rx: Receiver<EngineCommand>,
}

impl ReplyWorker {
    pub fn new(engine: ReplyEngine, command_rx: Receiver<EngineCommand>) -> Self {
        Self { engine, command_rx }
    }

    pub fn run(self) {
        debug!("Reply worker thread started");

        while let Ok(command) = self.command_rx.recv() {
            match command {
                EngineCommand::Notification { event, response_tx } => {
                    let outcome = self.engine.handle(&event);
                    if let Some(tx) = response_tx {
                        let _ = tx.send(outcome);
                    }
                }
                EngineCommand::Shutdown => {
                    debug!("Reply worker shutting down");
                    break;
                }
            }
        }

        debug!("Reply worker thread stopped");
    }
}
