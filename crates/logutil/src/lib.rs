//! Utilities for logging.
use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Output format for the global logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact single line output.
    #[default]
    HumanReadable,
    /// One json object per event.
    Json,
    /// Human readable with source locations and thread ids.
    Debug,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::HumanReadable => write!(f, "human"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Debug => write!(f, "debug"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "human" | "human_readable" | "humanreadable" => LogFormat::HumanReadable,
            "json" => LogFormat::Json,
            "debug" => LogFormat::Debug,
            other => return Err(format!("Unknown log format: {other}")),
        })
    }
}

fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

/// Configure the global logger.
///
/// `RUST_LOG` takes precedence over `default_level` when set. Calling this
/// more than once is a no-op, the first subscriber wins.
pub fn configure_global_logger<W>(default_level: Level, format: LogFormat, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = env_filter(default_level);

    let result = match format {
        LogFormat::HumanReadable => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(writer)
                .compact()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(writer)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Debug => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    };

    if result.is_err() {
        tracing::debug!("global logger already configured");
    }
}

/// Install a subscriber that writes through the test harness.
///
/// Safe to call from every test.
pub fn init_test() {
    let _ = FmtSubscriber::builder()
        .with_env_filter(env_filter(Level::DEBUG))
        .with_test_writer()
        .try_init();
}
