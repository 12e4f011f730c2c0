//! Logging setup for the covenant emulator.
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// The whoami string, which is used to identify the service in logs.
    whoami: String,
}

impl LoggerConfig {
    pub const fn new(whoami: String) -> Self {
        Self { whoami }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new("covenant-emulator".to_string())
    }
}

/// Initializes the logging subsystem with the provided config.
///
/// The filter is taken from `RUST_LOG`. `LOG_FILE=1` and `LOG_LINE_NUM=1`
/// annotate every event with its source location. Calling this again once a
/// global subscriber is installed does nothing.
pub fn init(config: LoggerConfig) {
    let filt = tracing_subscriber::EnvFilter::from_default_env();

    let log_file = std::env::var("LOG_FILE").is_ok_and(|v| v == "1");
    let log_line_num = std::env::var("LOG_LINE_NUM").is_ok_and(|v| v == "1");

    let stdout_sub = tracing_subscriber::fmt::layer()
        .compact()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_file(log_file)
                .with_line_number(log_line_num),
        )
        .with_filter(filt);

    if tracing_subscriber::registry()
        .with(stdout_sub)
        .try_init()
        .is_err()
    {
        debug!("global subscriber already installed");
        return;
    }

    info!(whoami = %config.whoami, "logging started");
}
