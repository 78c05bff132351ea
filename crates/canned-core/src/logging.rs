use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the global tracing subscriber for the daemon process.
///
/// Log levels come from `RUST_LOG`, defaulting to `info`. Setting
/// `CANNED_LOG_FILE` adds an append-mode debug log file on top of the
/// stderr output, which is the practical way to watch decisions while the
/// daemon runs detached.
pub fn init_logging() {
    let file_logging = std::env::var("CANNED_LOG_FILE").ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    let registry = tracing_subscriber::registry().with(stderr_layer);

    if let Some(log_path) = file_logging {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);
                registry.with(file_layer).init();
                eprintln!("File logging enabled: {}", log_path);
            }
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
                registry.init();
            }
        }
    } else {
        registry.init();
    }
}
