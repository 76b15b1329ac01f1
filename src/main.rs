//! cmdrdata - AI usage tracking diagnostics
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use cmdrdata::cli::{Cli, Commands};
use cmdrdata::core::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::from_arg)
        .or_else(logging::parse_log_level_from_env)
        .unwrap_or_default();
    let log_format = if cli.json_output {
        logging::LogFormat::Json
    } else {
        logging::parse_log_format_from_env().unwrap_or_default()
    };
    let log_file = logging::parse_log_file_from_env();
    logging::init(log_level, log_format, log_file, cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(code = e.error_code(), category = %e.category(), "Command failed");
            eprintln!("error[{}]: {e}", e.error_code());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> cmdrdata::Result<()> {
    let format = cli.effective_format();
    let pretty = cli.pretty;

    match cli.command {
        Commands::Detect(args) => cmdrdata::cli::detect::execute(&args, format, pretty),
        Commands::Extract(args) => cmdrdata::cli::extract::execute(&args, format, pretty),
        Commands::Send(args) => cmdrdata::cli::send::execute(&args, format, pretty).await,
        Commands::Smoke => cmdrdata::cli::smoke::execute(format, pretty),
        Commands::Config(args) => cmdrdata::cli::config::execute(&args, format, pretty),
    }
}
