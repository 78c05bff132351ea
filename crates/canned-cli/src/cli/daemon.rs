use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use canned_core::logging::init_logging;
use canned_core::{
    CoreConfig, EngineCommand, EngineRuntime, FilledInput, NotificationEvent, Outcome,
    ReplySender, ReplyTarget, SendError,
};

use super::config::CliConfig;
use super::protocol::{Request, Response};

const SOCKET_NAME: &str = "canned-cli.sock";
const PID_FILE: &str = "daemon.pid";

/// How long a `notify` request waits for the worker to report an outcome.
const OUTCOME_WAIT: Duration = Duration::from_secs(5);

/// Get socket path, using config override if provided
pub fn get_socket_path(config: Option<&CliConfig>) -> PathBuf {
    if let Some(cfg) = config {
        if let Some(ref path) = cfg.socket_path {
            return path.clone();
        }
    }
    default_socket_path()
}

/// Default socket path when no config is provided
pub fn default_socket_path() -> PathBuf {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".canned-cli");
    base_dir.join(SOCKET_NAME)
}

fn get_pid_path(config: Option<&CliConfig>) -> PathBuf {
    // Put PID file next to socket
    let socket_path = get_socket_path(config);
    if let Some(parent) = socket_path.parent() {
        parent.join(PID_FILE)
    } else {
        PathBuf::from(PID_FILE)
    }
}

fn get_data_dir(config: Option<&CliConfig>) -> PathBuf {
    if let Some(cfg) = config {
        if let Some(ref dir) = cfg.data_dir {
            return dir.clone();
        }
    }
    CoreConfig::default().data_dir
}

/// Filled reply queued for the notification bridge to perform.
///
/// The daemon never touches the origin notification itself. Whatever host
/// process feeds events in pulls this payload out of the `notify` response
/// and fires the action against the real notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyCommand {
    pub id: String,
    pub package: String,
    pub action_id: String,
    pub inputs: Vec<FilledInput>,
}

/// Sender that parks filled replies on a channel for the daemon loop.
struct BridgeSender {
    outbound_tx: mpsc::Sender<ReplyCommand>,
}

impl ReplySender for BridgeSender {
    fn send_reply(&self, target: &ReplyTarget, inputs: &[FilledInput]) -> Result<(), SendError> {
        let command = ReplyCommand {
            id: target.id.clone(),
            package: target.package.clone(),
            action_id: target.action_id.clone(),
            inputs: inputs.to_vec(),
        };
        self.outbound_tx
            .send(command)
            .map_err(|_| SendError::ChannelClosed)
    }
}

/// Run the daemon server
pub fn run_daemon(config: Option<CliConfig>) -> Result<()> {
    init_logging();
    eprintln!("Starting canned-cli daemon...");

    // Ensure base directory exists
    let socket_path = get_socket_path(config.as_ref());
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Remove stale socket if exists
    if socket_path.exists() {
        fs::remove_file(&socket_path)?;
    }

    // Write PID file
    let pid_path = get_pid_path(config.as_ref());
    fs::write(&pid_path, std::process::id().to_string())?;

    // Bind socket early so clients can connect while we initialize
    let listener = UnixListener::bind(&socket_path)?;
    eprintln!("Listening on {:?}", socket_path);

    // Initialize the reply engine with the bridge sender
    let data_dir = get_data_dir(config.as_ref());
    let (outbound_tx, outbound_rx) = mpsc::channel::<ReplyCommand>();
    let mut runtime = EngineRuntime::new(
        CoreConfig::new(&data_dir),
        Box::new(BridgeSender { outbound_tx }),
    )?;
    eprintln!("Reply engine ready, data dir {:?}", data_dir);

    // Track state
    let start_time = Instant::now();

    // Handle connections
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                match handle_connection(stream, &runtime, &outbound_rx, start_time) {
                    Ok(true) => {
                        eprintln!("Shutdown requested");
                        break;
                    }
                    Ok(false) => {}
                    // A client hanging up mid-request ends that connection,
                    // nothing else.
                    Err(e) => tracing::warn!("Connection failed: {:#}", e),
                }
            }
            Err(e) => {
                eprintln!("Connection error: {}", e);
            }
        }
    }

    // Cleanup
    runtime.shutdown();
    fs::remove_file(&socket_path).ok();
    fs::remove_file(&pid_path).ok();

    eprintln!("Daemon stopped");
    Ok(())
}

fn handle_connection(
    stream: UnixStream,
    runtime: &EngineRuntime,
    outbound_rx: &mpsc::Receiver<ReplyCommand>,
    start_time: Instant,
) -> Result<bool> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let mut line = String::new();

    while reader.read_line(&mut line)? > 0 {
        let request: Request = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                let response = Response::error(0, "PARSE_ERROR", &e.to_string());
                writeln!(writer, "{}", serde_json::to_string(&response)?)?;
                line.clear();
                continue;
            }
        };

        let (response, should_shutdown) =
            handle_request(&request, runtime, outbound_rx, start_time);

        writeln!(writer, "{}", serde_json::to_string(&response)?)?;
        writer.flush()?;

        if should_shutdown {
            return Ok(true);
        }

        line.clear();
    }

    Ok(false)
}

fn handle_request(
    request: &Request,
    runtime: &EngineRuntime,
    outbound_rx: &mpsc::Receiver<ReplyCommand>,
    start_time: Instant,
) -> (Response, bool) {
    let id = request.id;

    match request.method.as_str() {
        "notify" => {
            let event =
                match serde_json::from_value::<NotificationEvent>(request.params["event"].clone())
                {
                    Ok(event) => event,
                    Err(e) => {
                        return (
                            Response::error(id, "INVALID_PARAMS", &format!("Invalid event: {}", e)),
                            false,
                        )
                    }
                };

            let (response_tx, response_rx) = mpsc::channel();
            if runtime
                .handle()
                .send(EngineCommand::Notification {
                    event,
                    response_tx: Some(response_tx),
                })
                .is_err()
            {
                return (
                    Response::error(id, "ENGINE_UNAVAILABLE", "Reply worker is not running"),
                    false,
                );
            }

            match response_rx.recv_timeout(OUTCOME_WAIT) {
                Ok(Outcome::Replied { reply_id, .. }) => {
                    // The worker queues the filled reply before it reports
                    // the outcome, so the matching command is already
                    // waiting here. Anything queued ahead of it was left by
                    // a caller that stopped waiting; those replies are
                    // dropped, never handed to a later caller.
                    let mut reply = None;
                    while let Ok(command) = outbound_rx.try_recv() {
                        if command.id == reply_id {
                            reply = Some(command);
                            break;
                        }
                        tracing::warn!(
                            "Dropping undelivered reply {} from an earlier request",
                            command.id
                        );
                    }
                    (
                        Response::success(
                            id,
                            serde_json::json!({ "outcome": "replied", "reply": reply }),
                        ),
                        false,
                    )
                }
                Ok(Outcome::Skipped(reason)) => (
                    Response::success(
                        id,
                        serde_json::json!({ "outcome": "skipped", "reason": reason.as_str() }),
                    ),
                    false,
                ),
                Ok(Outcome::Failed { message }) => (
                    Response::success(
                        id,
                        serde_json::json!({ "outcome": "failed", "message": message }),
                    ),
                    false,
                ),
                Err(_) => (
                    Response::error(id, "TIMEOUT", "Timed out waiting for the reply outcome"),
                    false,
                ),
            }
        }

        "status" => {
            let prefs = runtime.preferences();
            let replies_sent = runtime.history().reply_count().unwrap_or(0);
            (
                Response::success(
                    id,
                    serde_json::json!({
                        "status": "running",
                        "service_enabled": prefs.is_service_enabled(),
                        "enabled_apps": prefs.enabled_apps(),
                        "replies_sent": replies_sent,
                        "uptime_seconds": start_time.elapsed().as_secs(),
                    }),
                ),
                false,
            )
        }

        "get_preferences" => (
            Response::success(id, serde_json::json!(runtime.preferences().snapshot())),
            false,
        ),

        "set_service_enabled" => match request.params["enabled"].as_bool() {
            Some(enabled) => {
                runtime.preferences().set_service_enabled(enabled);
                (
                    Response::success(
                        id,
                        serde_json::json!({ "status": "ok", "service_enabled": enabled }),
                    ),
                    false,
                )
            }
            None => (
                Response::error(id, "INVALID_PARAMS", "enabled is required"),
                false,
            ),
        },

        "enable_app" => {
            let package = request.params["package"].as_str().unwrap_or("");
            if package.is_empty() {
                return (
                    Response::error(id, "INVALID_PARAMS", "package is required"),
                    false,
                );
            }
            runtime.preferences().enable_app(package);
            (
                Response::success(
                    id,
                    serde_json::json!({
                        "status": "ok",
                        "enabled_apps": runtime.preferences().enabled_apps(),
                    }),
                ),
                false,
            )
        }

        "disable_app" => {
            let package = request.params["package"].as_str().unwrap_or("");
            if package.is_empty() {
                return (
                    Response::error(id, "INVALID_PARAMS", "package is required"),
                    false,
                );
            }
            runtime.preferences().disable_app(package);
            (
                Response::success(
                    id,
                    serde_json::json!({
                        "status": "ok",
                        "enabled_apps": runtime.preferences().enabled_apps(),
                    }),
                ),
                false,
            )
        }

        "set_reply_text" => match request.params["text"].as_str() {
            Some(text) => {
                runtime.preferences().set_reply_text(text);
                (
                    Response::success(id, serde_json::json!({ "status": "ok" })),
                    false,
                )
            }
            None => (
                Response::error(id, "INVALID_PARAMS", "text is required"),
                false,
            ),
        },

        "set_reply_delay" => match request.params["delay_ms"].as_u64() {
            Some(delay_ms) => {
                runtime.preferences().set_reply_delay_ms(delay_ms);
                (
                    Response::success(
                        id,
                        serde_json::json!({ "status": "ok", "reply_delay_ms": delay_ms }),
                    ),
                    false,
                )
            }
            None => (
                Response::error(id, "INVALID_PARAMS", "delay_ms is required"),
                false,
            ),
        },

        "set_group_replies" => match request.params["enabled"].as_bool() {
            Some(enabled) => {
                runtime.preferences().set_group_replies_enabled(enabled);
                (
                    Response::success(
                        id,
                        serde_json::json!({ "status": "ok", "group_replies_enabled": enabled }),
                    ),
                    false,
                )
            }
            None => (
                Response::error(id, "INVALID_PARAMS", "enabled is required"),
                false,
            ),
        },

        "recent_replies" => {
            let limit = request.params["limit"].as_u64().unwrap_or(20);
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            match runtime.history().recent_replies(limit) {
                Ok(records) => (Response::success(id, serde_json::json!(records)), false),
                Err(e) => (Response::error(id, "STORAGE", &e.to_string()), false),
            }
        }

        "shutdown" => (
            Response::success(id, serde_json::json!({ "status": "shutting_down" })),
            true,
        ),

        _ => (
            Response::error(
                id,
                "UNKNOWN_METHOD",
                &format!("Unknown method: {}", request.method),
            ),
            false,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canned_core::constants::DEFAULT_REPLY_TEXT;
    use tempfile::tempdir;

    fn test_runtime(dir: &std::path::Path) -> (EngineRuntime, mpsc::Receiver<ReplyCommand>) {
        let (outbound_tx, outbound_rx) = mpsc::channel();
        let runtime = EngineRuntime::new(
            CoreConfig::new(dir),
            Box::new(BridgeSender { outbound_tx }),
        )
        .unwrap();
        (runtime, outbound_rx)
    }

    fn request(method: &str, params: serde_json::Value) -> Request {
        Request {
            id: 7,
            method: method.to_string(),
            params,
        }
    }

    fn whatsapp_event() -> NotificationEvent {
        NotificationEvent::new("com.whatsapp")
            .with_title("Alice")
            .with_reply_action("reply-0", &["reply_text"])
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let dir = tempdir().unwrap();
        let (mut runtime, outbound_rx) = test_runtime(dir.path());

        let (response, shutdown) = handle_request(
            &request("frobnicate", serde_json::json!({})),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        assert!(!shutdown);
        assert_eq!(response.error.unwrap().code, "UNKNOWN_METHOD");
        runtime.shutdown();
    }

    #[test]
    fn test_notify_without_event_is_invalid_params() {
        let dir = tempdir().unwrap();
        let (mut runtime, outbound_rx) = test_runtime(dir.path());

        let (response, _) = handle_request(
            &request("notify", serde_json::json!({})),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        assert_eq!(response.error.unwrap().code, "INVALID_PARAMS");
        runtime.shutdown();
    }

    #[test]
    fn test_notify_returns_the_reply_payload() {
        let dir = tempdir().unwrap();
        let (mut runtime, outbound_rx) = test_runtime(dir.path());

        handle_request(
            &request("enable_app", serde_json::json!({ "package": "com.whatsapp" })),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        let (response, _) = handle_request(
            &request("notify", serde_json::json!({ "event": whatsapp_event() })),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        let result = response.result.unwrap();
        assert_eq!(result["outcome"], "replied");
        assert_eq!(result["reply"]["package"], "com.whatsapp");
        assert_eq!(result["reply"]["action_id"], "reply-0");
        assert_eq!(result["reply"]["inputs"][0]["key"], "reply_text");
        assert_eq!(result["reply"]["inputs"][0]["text"], DEFAULT_REPLY_TEXT);
        runtime.shutdown();
    }

    #[test]
    fn test_notify_reports_skip_reason() {
        let dir = tempdir().unwrap();
        let (mut runtime, outbound_rx) = test_runtime(dir.path());

        let (response, _) = handle_request(
            &request("notify", serde_json::json!({ "event": whatsapp_event() })),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        let result = response.result.unwrap();
        assert_eq!(result["outcome"], "skipped");
        assert_eq!(result["reason"], "app_not_enabled");
        runtime.shutdown();
    }

    #[test]
    fn test_status_counts_replies() {
        let dir = tempdir().unwrap();
        let (mut runtime, outbound_rx) = test_runtime(dir.path());

        handle_request(
            &request("enable_app", serde_json::json!({ "package": "com.whatsapp" })),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );
        handle_request(
            &request("notify", serde_json::json!({ "event": whatsapp_event() })),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        let (response, _) = handle_request(
            &request("status", serde_json::json!({})),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        let result = response.result.unwrap();
        assert_eq!(result["status"], "running");
        assert_eq!(result["replies_sent"], 1);
        assert_eq!(result["enabled_apps"][0], "com.whatsapp");
        runtime.shutdown();
    }

    #[test]
    fn test_recent_replies_lists_the_log() {
        let dir = tempdir().unwrap();
        let (mut runtime, outbound_rx) = test_runtime(dir.path());

        handle_request(
            &request("enable_app", serde_json::json!({ "package": "com.whatsapp" })),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );
        handle_request(
            &request("notify", serde_json::json!({ "event": whatsapp_event() })),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        let (response, _) = handle_request(
            &request("recent_replies", serde_json::json!({ "limit": 10 })),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        let result = response.result.unwrap();
        let records = result.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["conversation_title"], "Alice");
        runtime.shutdown();
    }

    #[test]
    fn test_preference_mutations_round_trip() {
        let dir = tempdir().unwrap();
        let (mut runtime, outbound_rx) = test_runtime(dir.path());
        let now = Instant::now();

        handle_request(
            &request("set_service_enabled", serde_json::json!({ "enabled": false })),
            &runtime,
            &outbound_rx,
            now,
        );
        handle_request(
            &request("set_reply_text", serde_json::json!({ "text": "gone fishing" })),
            &runtime,
            &outbound_rx,
            now,
        );
        handle_request(
            &request("set_reply_delay", serde_json::json!({ "delay_ms": 60_000 })),
            &runtime,
            &outbound_rx,
            now,
        );
        handle_request(
            &request("set_group_replies", serde_json::json!({ "enabled": true })),
            &runtime,
            &outbound_rx,
            now,
        );

        let (response, _) = handle_request(
            &request("get_preferences", serde_json::json!({})),
            &runtime,
            &outbound_rx,
            now,
        );

        let prefs = response.result.unwrap();
        assert_eq!(prefs["service_enabled"], false);
        assert_eq!(prefs["reply_text"], "gone fishing");
        assert_eq!(prefs["reply_delay_ms"], 60_000);
        assert_eq!(prefs["group_replies_enabled"], true);
        runtime.shutdown();
    }

    #[test]
    fn test_shutdown_sets_the_flag() {
        let dir = tempdir().unwrap();
        let (mut runtime, outbound_rx) = test_runtime(dir.path());

        let (response, shutdown) = handle_request(
            &request("shutdown", serde_json::json!({})),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        assert!(shutdown);
        assert!(response.result.is_some());
        runtime.shutdown();
    }

    #[test]
    fn test_connection_handles_garbage_then_requests() {
        let dir = tempdir().unwrap();
        let (runtime, outbound_rx) = test_runtime(dir.path());

        let (client, server) = UnixStream::pair().unwrap();
        let worker = std::thread::spawn(move || {
            let shutdown =
                handle_connection(server, &runtime, &outbound_rx, Instant::now()).unwrap();
            (runtime, shutdown)
        });

        let mut writer = client.try_clone().unwrap();
        let mut reader = BufReader::new(client);

        writeln!(writer, "this is not json").unwrap();
        writeln!(writer, r#"{{"id": 3, "method": "shutdown", "params": {{}}}}"#).unwrap();
        writer.flush().unwrap();

        let mut first = String::new();
        reader.read_line(&mut first).unwrap();
        let parse_error: Response = serde_json::from_str(&first).unwrap();
        assert_eq!(parse_error.id, 0);
        assert_eq!(parse_error.error.unwrap().code, "PARSE_ERROR");

        let mut second = String::new();
        reader.read_line(&mut second).unwrap();
        let ok: Response = serde_json::from_str(&second).unwrap();
        assert_eq!(ok.id, 3);
        assert!(ok.error.is_none());

        let (mut runtime, shutdown) = worker.join().unwrap();
        assert!(shutdown);
        runtime.shutdown();
    }

    #[test]
    fn test_notify_ignores_replies_from_earlier_requests() {
        let dir = tempdir().unwrap();
        let (outbound_tx, outbound_rx) = mpsc::channel();
        let mut runtime = EngineRuntime::new(
            CoreConfig::new(dir.path()),
            Box::new(BridgeSender {
                outbound_tx: outbound_tx.clone(),
            }),
        )
        .unwrap();

        handle_request(
            &request(
                "enable_app",
                serde_json::json!({ "package": "org.telegram.messenger" }),
            ),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        // A caller that stopped waiting leaves its payload on the channel.
        outbound_tx
            .send(ReplyCommand {
                id: "stale".to_string(),
                package: "com.whatsapp".to_string(),
                action_id: "reply-wa".to_string(),
                inputs: Vec::new(),
            })
            .unwrap();

        let event = NotificationEvent::new("org.telegram.messenger")
            .with_title("Bob")
            .with_reply_action("reply-tg", &["reply_text"]);
        let (response, _) = handle_request(
            &request("notify", serde_json::json!({ "event": event })),
            &runtime,
            &outbound_rx,
            Instant::now(),
        );

        let result = response.result.unwrap();
        assert_eq!(result["outcome"], "replied");
        assert_eq!(result["reply"]["package"], "org.telegram.messenger");
        assert_eq!(result["reply"]["action_id"], "reply-tg");
        // The stale payload was discarded, not queued for anyone else.
        assert!(outbound_rx.try_recv().is_err());
        runtime.shutdown();
    }

    #[test]
    fn test_dropped_client_does_not_stop_the_daemon() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("canned-cli.sock");
        let config = CliConfig {
            socket_path: Some(socket.clone()),
            data_dir: Some(dir.path().join("data")),
        };

        let daemon = std::thread::spawn(move || run_daemon(Some(config)));

        let connect = |deadline: Instant| loop {
            if let Ok(stream) = UnixStream::connect(&socket) {
                break stream;
            }
            assert!(Instant::now() < deadline, "daemon did not accept in time");
            std::thread::sleep(Duration::from_millis(10));
        };

        // First client hangs up before reading its response.
        let mut first = connect(Instant::now() + Duration::from_secs(5));
        writeln!(first, r#"{{"id": 1, "method": "status", "params": {{}}}}"#).unwrap();
        drop(first);

        // The daemon must keep serving connections afterwards.
        let second = connect(Instant::now() + Duration::from_secs(5));
        let mut writer = second.try_clone().unwrap();
        let mut reader = BufReader::new(second);
        writeln!(writer, r#"{{"id": 2, "method": "shutdown", "params": {{}}}}"#).unwrap();
        writer.flush().unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let response: Response = serde_json::from_str(&line).unwrap();
        assert_eq!(response.id, 2);
        assert!(response.error.is_none());

        daemon.join().unwrap().unwrap();
    }
}
