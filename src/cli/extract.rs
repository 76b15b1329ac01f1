//! Extract command implementation.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::cli::args::{ExtractArgs, OutputFormat};
use crate::cli::print_json;
use crate::core::provider::Provider;
use crate::core::usage::{TokenUsage, extract_model, extract_usage};
use crate::error::{CmdrDataError, Result};

#[derive(Debug, Serialize)]
struct ExtractOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<Provider>,
    model: Option<String>,
    usage: Option<TokenUsage>,
}

/// Execute the extract command.
///
/// # Errors
///
/// Returns `ParseResponse` when the input is not JSON, or an I/O error.
pub fn execute(args: &ExtractArgs, format: OutputFormat, pretty: bool) -> Result<()> {
    let text = read_input(args.file.as_deref())?;
    let output = extract(&text, args.client_type.as_deref())?;

    match format {
        OutputFormat::Json => print_json(&output, pretty)?,
        OutputFormat::Human => {
            if let Some(provider) = &output.provider {
                println!("provider: {provider}");
            }
            println!("model:    {}", output.model.as_deref().unwrap_or("-"));
            match output.usage {
                Some(usage) => println!(
                    "tokens:   {} in / {} out / {} total",
                    usage.input_tokens, usage.output_tokens, usage.total_tokens
                ),
                None => println!("tokens:   no usage found"),
            }
        }
    }
    Ok(())
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => Ok(std::fs::read_to_string(path)?),
        _ => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn extract(text: &str, client_type: Option<&str>) -> Result<ExtractOutput> {
    let response: Value =
        serde_json::from_str(text).map_err(|e| CmdrDataError::ParseResponse(e.to_string()))?;
    let usage = extract_usage(&response);
    if usage.is_none() {
        tracing::info!("No known usage shape in response");
    }
    Ok(ExtractOutput {
        provider: client_type.map(Provider::detect),
        model: extract_model(&response),
        usage,
    })
}
