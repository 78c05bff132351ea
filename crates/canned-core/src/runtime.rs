use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use anyhow::Result;

use crate::config::CoreConfig;
use crate::engine::ReplyEngine;
use crate::models::reply::ReplySender;
use crate::preferences::PreferencesStorage;
use crate::store::{Database, ReplyHistory};
use crate::worker::{EngineCommand, ReplyWorker};

/// Cloneable submission handle for the reply worker.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: Sender<EngineCommand>,
}

impl EngineHandle {
    pub(crate) fn new(command_tx: Sender<EngineCommand>) -> Self {
        Self { command_tx }
    }

    pub fn send(&self, command: EngineCommand) -> Result<(), mpsc::SendError<EngineCommand>> {
        self.command_tx.send(command)
    }
}

/// Owns the worker thread plus the shared stores behind it.
///
/// Construction wires preferences, the reply log, and the injected sender
/// into a [`ReplyEngine`] and spawns the worker. Dropping the runtime
/// without calling [`EngineRuntime::shutdown`] leaves the thread running
/// until every handle is gone.
pub struct EngineRuntime {
    prefs: PreferencesStorage,
    history: ReplyHistory,
    handle: EngineHandle,
    worker_handle: Option<JoinHandle<()>>,
}

impl EngineRuntime {
    pub fn new(config: CoreConfig, sender: Box<dyn ReplySender>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let prefs = PreferencesStorage::new(&config.data_dir);
        let db = Database::open(config.history_db_path())?;
        let history = ReplyHistory::new(&db);

        let (command_tx, command_rx) = mpsc::channel::<EngineCommand>();
        let engine = ReplyEngine::new(prefs.clone(), history.clone(), sender);
        let worker = ReplyWorker::new(engine, command_rx);
        let worker_handle = std::thread::spawn(move || {
            worker.run();
        });

        Ok(Self {
            prefs,
            history,
            handle: EngineHandle::new(command_tx),
            worker_handle: Some(worker_handle),
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn preferences(&self) -> PreferencesStorage {
        self.prefs.clone()
    }

    pub fn history(&self) -> ReplyHistory {
        self.history.clone()
    }

    pub fn shutdown(&mut self) {
        let _ = self.handle.send(EngineCommand::Shutdown);
        if let Some(worker_handle) = self.worker_handle.take() {
            let _ = worker_handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Outcome;
    use crate::models::notification::NotificationEvent;
    use crate::models::reply::{FilledInput, ReplyTarget, SendError};
    use tempfile::tempdir;

    struct NullSender;

    impl ReplySender for NullSender {
        fn send_reply(&self, _: &ReplyTarget, _: &[FilledInput]) -> Result<(), SendError> {
            Ok(())
        }
    }

    #[test]
    fn test_runtime_round_trip() {
        let dir = tempdir().unwrap();
        let mut runtime =
            EngineRuntime::new(CoreConfig::new(dir.path()), Box::new(NullSender)).unwrap();

        runtime.preferences().enable_app("com.whatsapp");

        let (response_tx, response_rx) = mpsc::channel();
        runtime
            .handle()
            .send(EngineCommand::Notification {
                event: NotificationEvent::new("com.whatsapp")
                    .with_title("Alice")
                    .with_reply_action("reply-0", &["reply_text"]),
                response_tx: Some(response_tx),
            })
            .unwrap();

        let outcome = response_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert!(matches!(outcome, Outcome::Replied { .. }));
        assert_eq!(runtime.history().reply_count().unwrap(), 1);

        runtime.shutdown();
    }

    #[test]
    fn test_shutdown_joins_worker() {
        let dir = tempdir().unwrap();
        let mut runtime =
            EngineRuntime::new(CoreConfig::new(dir.path()), Box::new(NullSender)).unwrap();
        runtime.shutdown();
        // Idempotent; the second call has no thread left to join.
        runtime.shutdown();
    }
}
