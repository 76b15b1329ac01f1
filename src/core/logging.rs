//! Logging setup for the `cmdrdata` binary.
//!
//! The library only emits `tracing` events; applications embedding it bring
//! their own subscriber. The CLI calls [`init`] once at startup.

use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const LOG_LEVEL_ENV: &str = "CMDRDATA_LOG";
const LOG_FORMAT_ENV: &str = "CMDRDATA_LOG_FORMAT";
const LOG_FILE_ENV: &str = "CMDRDATA_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    Json,
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" | "pretty" => Some(Self::Human),
            "json" | "jsonl" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Verbosity accepted by `--log-level` and `CMDRDATA_LOG`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Off,
}

impl LogLevel {
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "verbose" | "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "off" | "none" | "quiet" => Some(Self::Off),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Log level from `CMDRDATA_LOG`.
#[must_use]
pub fn parse_log_level_from_env() -> Option<LogLevel> {
    env_value(LOG_LEVEL_ENV).and_then(|value| LogLevel::from_arg(&value))
}

/// Log format from `CMDRDATA_LOG_FORMAT`.
#[must_use]
pub fn parse_log_format_from_env() -> Option<LogFormat> {
    env_value(LOG_FORMAT_ENV).and_then(|value| LogFormat::from_arg(&value))
}

/// Log file from `CMDRDATA_LOG_FILE`.
#[must_use]
pub fn parse_log_file_from_env() -> Option<PathBuf> {
    env_value(LOG_FILE_ENV).map(PathBuf::from)
}

/// Filter directive for our own targets. `RUST_LOG` wins when set.
fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cmdrdata={}", level.as_filter())))
}

/// Install the global subscriber. Later calls are ignored.
///
/// `verbose` raises the default level to debug. Logs go to `log_file` when
/// it can be opened, stderr otherwise; stdout stays reserved for command
/// output.
pub fn init(level: LogLevel, format: LogFormat, log_file: Option<PathBuf>, verbose: bool) {
    let level = if verbose && level == LogLevel::Warn {
        LogLevel::Debug
    } else {
        level
    };

    let writer = log_file
        .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok())
        .map_or_else(|| BoxMakeWriter::new(std::io::stderr), BoxMakeWriter::new);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_writer(writer);

    // try_init fails only when a subscriber is already installed.
    let _ = match format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Compact => builder.compact().with_target(true).try_init(),
        LogFormat::Human => builder.with_target(false).without_time().try_init(),
    };
}
