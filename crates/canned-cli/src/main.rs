use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use canned_cli::cli::{
    is_daemon_running, run_daemon, send_command, socket_path, CliCommand, CliConfig,
};
use canned_core::NotificationEvent;

#[derive(Parser)]
#[command(name = "canned-cli")]
#[command(about = "Auto-reply engine for chat notifications")]
struct Cli {
    /// Start daemon in foreground
    #[arg(long)]
    daemon: bool,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (contains socketPath, dataDir)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// JSON config passed internally (used when spawning daemon)
    #[arg(long, hide = true)]
    config_json: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Get daemon status
    Status {
        /// Quick check if daemon is running (doesn't auto-start daemon)
        #[arg(long)]
        running: bool,
    },

    /// Pause auto-replies without touching any other settings
    Pause,

    /// Resume auto-replies
    Resume,

    /// List the packages auto-reply is enabled for
    Apps,

    /// Enable auto-replies for a package
    Enable {
        /// Package name, e.g. com.whatsapp
        package: String,
    },

    /// Disable auto-replies for a package
    Disable {
        /// Package name, e.g. com.whatsapp
        package: String,
    },

    /// Set the canned reply text
    SetMessage {
        /// Reply text; an empty string restores the default
        text: String,
    },

    /// Set the per-conversation delay between replies
    SetDelay {
        /// Delay in milliseconds; values below the floor are raised to it
        delay_ms: u64,
    },

    /// Toggle replies to group conversations
    GroupReplies {
        /// "on" or "off"
        #[arg(value_parser = parse_on_off)]
        enabled: bool,
    },

    /// Dump the full preferences document
    Preferences,

    /// Show recent auto-replies, newest first
    Log {
        /// Maximum number of entries
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Feed one notification event through the pipeline
    Notify {
        /// Full notification event as JSON; overrides the other flags
        #[arg(long)]
        json: Option<String>,

        /// Source package, e.g. com.whatsapp
        #[arg(long, short = 'P', required_unless_present = "json")]
        package: Option<String>,

        /// Conversation title
        #[arg(long, short = 't')]
        title: Option<String>,

        /// Posted-at time in epoch milliseconds; defaults to now
        #[arg(long)]
        when: Option<u64>,

        /// Mark the event as a group conversation
        #[arg(long)]
        group: bool,

        /// Action id carrying the reply input
        #[arg(long, default_value = "reply")]
        action: String,

        /// Remote-input result key to fill
        #[arg(long, default_value = "reply_text")]
        input_key: String,
    },

    /// Shutdown the daemon
    Shutdown,
}

fn parse_on_off(value: &str) -> Result<bool, String> {
    match value {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(format!("expected \"on\" or \"off\", got \"{}\"", value)),
    }
}

fn main() {
    let cli = Cli::parse();

    // Load config from file or JSON string
    let config = load_config(&cli);

    // Run daemon mode
    if cli.daemon {
        if let Err(e) = run_daemon(config) {
            eprintln!("Daemon error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Convert subcommand to CliCommand
    let command = match cli.command {
        Some(Commands::Status { running }) => {
            if running {
                // Quick check without auto-starting daemon
                let is_running = is_daemon_running(config.as_ref());
                let path = socket_path(config.as_ref());
                let status = serde_json::json!({
                    "running": is_running,
                    "socket_path": path.display().to_string(),
                });
                if cli.pretty {
                    println!("{}", serde_json::to_string_pretty(&status).unwrap());
                } else {
                    println!("{}", serde_json::to_string(&status).unwrap());
                }
                std::process::exit(if is_running { 0 } else { 1 });
            }
            CliCommand::Status
        }
        Some(Commands::Pause) => CliCommand::Pause,
        Some(Commands::Resume) => CliCommand::Resume,
        Some(Commands::Apps) => CliCommand::Apps,
        Some(Commands::Enable { package }) => CliCommand::EnableApp { package },
        Some(Commands::Disable { package }) => CliCommand::DisableApp { package },
        Some(Commands::SetMessage { text }) => CliCommand::SetMessage { text },
        Some(Commands::SetDelay { delay_ms }) => CliCommand::SetDelay { delay_ms },
        Some(Commands::GroupReplies { enabled }) => CliCommand::GroupReplies { enabled },
        Some(Commands::Preferences) => CliCommand::Preferences,
        Some(Commands::Log { limit }) => CliCommand::Log { limit },
        Some(Commands::Notify {
            json,
            package,
            title,
            when,
            group,
            action,
            input_key,
        }) => {
            let event = match build_event(json, package, title, when, group, action, input_key) {
                Ok(event) => event,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            CliCommand::Notify { event }
        }
        Some(Commands::Shutdown) => CliCommand::Shutdown,
        None => {
            // No command - show help
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    // Send command to daemon
    if let Err(e) = send_command(command, cli.pretty, config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file or JSON string
fn load_config(cli: &Cli) -> Option<CliConfig> {
    // Priority: --config-json (internal) > --config (file)
    if let Some(ref json) = cli.config_json {
        match CliConfig::from_json(json) {
            Ok(config) => return Some(config),
            Err(e) => {
                eprintln!("Warning: Failed to parse config JSON: {}", e);
            }
        }
    }

    if let Some(ref path) = cli.config {
        match CliConfig::load(path) {
            Ok(config) => return Some(config),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    None
}

/// Build a notification event from `notify` arguments
#[allow(clippy::too_many_arguments)]
fn build_event(
    json: Option<String>,
    package: Option<String>,
    title: Option<String>,
    when: Option<u64>,
    group: bool,
    action: String,
    input_key: String,
) -> anyhow::Result<NotificationEvent> {
    if let Some(json) = json {
        let event = serde_json::from_str(&json).context("Failed to parse event JSON")?;
        return Ok(event);
    }

    let package = package.context("--package is required without --json")?;
    let when = when.unwrap_or_else(|| Utc::now().timestamp_millis().max(0) as u64);

    let mut event = NotificationEvent::new(package)
        .with_when(when)
        .with_reply_action(action, &[input_key.as_str()]);
    if let Some(title) = title {
        event = event.with_title(title);
    }
    if group {
        event = event.with_group_conversation(true);
    }
    Ok(event)
}
