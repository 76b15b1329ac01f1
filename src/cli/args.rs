//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// cmdrdata - diagnose AI usage tracking.
#[derive(Parser, Debug)]
#[command(name = "cmdrdata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect the provider for a client type path
    Detect(DetectArgs),

    /// Extract token usage from a provider response (file or stdin)
    Extract(ExtractArgs),

    /// Send one test usage event to the tracking backend
    Send(SendArgs),

    /// Run offline self-checks
    Smoke,

    /// Show the resolved tracking configuration
    Config(ConfigArgs),
}

/// Arguments for the `detect` command.
#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Type or module path, e.g. `async_openai::Client`
    #[arg(value_name = "TYPE_PATH")]
    pub type_path: String,

    /// Extra detection rule (NEEDLE=PROVIDER), checked before built-ins
    #[arg(long = "rule", value_name = "NEEDLE=PROVIDER")]
    pub rules: Vec<String>,
}

/// Arguments for the `extract` command.
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Response JSON file; reads stdin when omitted or `-`
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Client type path to report a provider alongside the usage
    #[arg(long, value_name = "TYPE_PATH")]
    pub client_type: Option<String>,
}

/// Settings shared by commands that talk to the backend.
#[derive(Parser, Debug, Default)]
pub struct TrackingArgs {
    /// Tracking API key
    #[arg(long, value_name = "KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Tracking endpoint URL
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Retries after the first attempt
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Arguments for the `send` command.
#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Provider tag for the event
    #[arg(long, default_value = "openai")]
    pub provider: String,

    /// Model name for the event
    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,

    /// Customer id for the event
    #[arg(long, value_name = "ID")]
    pub customer_id: Option<String>,

    #[arg(long, default_value_t = 10)]
    pub input_tokens: u64,

    #[arg(long, default_value_t = 20)]
    pub output_tokens: u64,

    #[command(flatten)]
    pub tracking: TrackingArgs,
}

/// Arguments for the `config` command.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub tracking: TrackingArgs,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}
