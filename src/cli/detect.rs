//! Detect command implementation.

use serde::Serialize;

use crate::cli::args::{DetectArgs, OutputFormat};
use crate::cli::print_json;
use crate::core::provider::{Provider, ProviderRegistry};
use crate::error::{CmdrDataError, Result};

#[derive(Debug, Serialize)]
struct DetectOutput<'a> {
    type_path: &'a str,
    provider: Provider,
    known: bool,
}

/// Execute the detect command.
///
/// # Errors
///
/// Returns `ConfigInvalid` for a malformed `--rule`.
pub fn execute(args: &DetectArgs, format: OutputFormat, pretty: bool) -> Result<()> {
    let registry = build_registry(&args.rules)?;
    let provider = registry.detect(&args.type_path);

    match format {
        OutputFormat::Human => println!("{}", provider.as_tag()),
        OutputFormat::Json => print_json(
            &DetectOutput {
                type_path: &args.type_path,
                known: provider.is_known(),
                provider,
            },
            pretty,
        )?,
    }
    Ok(())
}

fn build_registry(rules: &[String]) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for rule in rules {
        let (needle, provider) = rule
            .split_once('=')
            .filter(|(needle, provider)| !needle.trim().is_empty() && !provider.trim().is_empty())
            .ok_or_else(|| CmdrDataError::ConfigInvalid {
                key: "rule".to_string(),
                message: format!("expected NEEDLE=PROVIDER, got '{rule}'"),
            })?;
        registry.register(needle, Provider::from_tag(provider));
    }
    Ok(registry)
}
