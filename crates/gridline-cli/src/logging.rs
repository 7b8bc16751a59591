//! Logging setup for the gridline binary
//!
//! Console output goes to stderr so that stdout stays parseable (`--json`).
//! A JSON file layer with daily rotation is added when a log directory is
//! available. `RUST_LOG` takes precedence over the verbosity flag.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for JSON log files; `None` disables the file layer
    pub log_dir: Option<PathBuf>,
    pub enable_console_logs: bool,
    pub include_location: bool,
    pub default_filter: String,
}

impl LoggingConfig {
    /// `-v` raises grid crates to debug, `-vv` everything to trace
    pub fn for_verbosity(verbose: u8) -> Self {
        let default_filter = match verbose {
            0 => "warn,gridline_services=info,gridline_cli=info",
            1 => "info,gridline_core=debug,gridline_services=debug,gridline_settings=debug,gridline_cli=debug",
            _ => "trace",
        }
        .to_string();

        Self {
            log_dir: gridline_settings::logs_dir().ok(),
            enable_console_logs: verbose > 0,
            include_location: verbose > 1,
            default_filter,
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the program.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut layers = Vec::new();

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .pretty()
            .with_filter(env_filter.clone())
            .boxed();
        layers.push(console_layer);
    }

    let mut guard = None;
    if let Some(log_dir) = &config.log_dir {
        match std::fs::create_dir_all(log_dir) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(log_dir, "gridline.log");
                let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
                guard = Some(worker_guard);

                let json_layer = fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(non_blocking)
                    .with_filter(env_filter)
                    .boxed();
                layers.push(json_layer);
            }
            Err(err) => {
                eprintln!("warning: file logging disabled ({}): {}", log_dir.display(), err);
            }
        }
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        log_dir = ?config.log_dir,
        console_enabled = config.enable_console_logs,
        "Logging initialized"
    );
    Ok(guard)
}
