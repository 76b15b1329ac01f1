//! CLI argument parsing and command dispatch.

pub mod args;
pub mod config;
pub mod detect;
pub mod extract;
pub mod send;
pub mod smoke;

use std::time::Duration;

use serde::Serialize;

pub use args::{Cli, Commands, OutputFormat};

use crate::error::Result;
use crate::storage::config::ConfigOverrides;

impl args::TrackingArgs {
    /// Explicit configuration values given on the command line.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_key: self.api_key.clone(),
            endpoint: self.endpoint.clone(),
            timeout: self.timeout.map(Duration::from_secs),
            max_retries: self.max_retries,
            disable_tracking: None,
            config_path: self.config.clone(),
        }
    }
}

/// Print `value` as JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
