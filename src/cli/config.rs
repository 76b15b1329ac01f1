//! Config command implementation.

use serde::Serialize;

use crate::cli::args::{ConfigArgs, OutputFormat};
use crate::cli::print_json;
use crate::core::fingerprint::describe;
use crate::error::Result;
use crate::storage::config::{Config, ENV_CONFIG, TrackerConfig};

#[derive(Debug, Serialize)]
struct Setting {
    name: &'static str,
    value: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    config_file: String,
    settings: Vec<Setting>,
}

/// Execute the config command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be resolved.
pub fn execute(args: &ConfigArgs, format: OutputFormat, pretty: bool) -> Result<()> {
    let overrides = args.tracking.overrides();
    let config = TrackerConfig::resolve(&overrides)?;

    let config_file = overrides
        .config_path
        .or_else(|| std::env::var_os(ENV_CONFIG).map(Into::into))
        .unwrap_or_else(Config::config_path);
    let output = ConfigOutput {
        config_file: config_file.display().to_string(),
        settings: settings(&config),
    };

    match format {
        OutputFormat::Json => print_json(&output, pretty)?,
        OutputFormat::Human => {
            println!("Config file: {}", output.config_file);
            for setting in &output.settings {
                println!(
                    "  {:<17} {:<40} ({})",
                    setting.name, setting.value, setting.source
                );
            }
        }
    }
    Ok(())
}

fn settings(config: &TrackerConfig) -> Vec<Setting> {
    let sources = &config.sources;
    vec![
        Setting {
            name: "api_key",
            value: describe(config.api_key.as_deref()),
            source: sources.api_key.to_string(),
        },
        Setting {
            name: "endpoint",
            value: config.endpoint.clone(),
            source: sources.endpoint.to_string(),
        },
        Setting {
            name: "timeout",
            value: format!("{}s", config.timeout.as_secs()),
            source: sources.timeout.to_string(),
        },
        Setting {
            name: "max_retries",
            value: config.max_retries.to_string(),
            source: sources.max_retries.to_string(),
        },
        Setting {
            name: "disable_tracking",
            value: config.disable_tracking.to_string(),
            source: sources.disable_tracking.to_string(),
        },
    ]
}
