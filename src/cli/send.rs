//! Send command implementation.

use std::time::Instant;

use serde::Serialize;

use crate::cli::args::{OutputFormat, SendArgs};
use crate::cli::print_json;
use crate::core::fingerprint::fingerprint;
use crate::core::models::UsageEvent;
use crate::core::provider::Provider;
use crate::core::tracker::HttpUsageReporter;
use crate::core::usage::TokenUsage;
use crate::error::Result;
use crate::storage::config::TrackerConfig;

#[derive(Debug, Serialize)]
struct SendOutput<'a> {
    delivered: bool,
    endpoint: &'a str,
    api_key: String,
    duration_ms: u64,
    event: &'a UsageEvent,
}

/// Execute the send command.
///
/// # Errors
///
/// Returns a configuration error when no key is configured, or the delivery
/// error once retries are exhausted.
pub async fn execute(args: &SendArgs, format: OutputFormat, pretty: bool) -> Result<()> {
    let config = TrackerConfig::resolve(&args.tracking.overrides())?;
    let settings = config.delivery_settings()?;
    let key_fingerprint = fingerprint(&settings.api_key);
    let reporter = HttpUsageReporter::new(settings)?;

    let event = build_event(args);
    tracing::info!(
        endpoint = reporter.endpoint(),
        provider = %event.provider,
        "Sending test usage event"
    );

    let started = Instant::now();
    reporter.send_now(event.clone()).await?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match format {
        OutputFormat::Json => print_json(
            &SendOutput {
                delivered: true,
                endpoint: reporter.endpoint(),
                api_key: key_fingerprint,
                duration_ms,
                event: &event,
            },
            pretty,
        )?,
        OutputFormat::Human => println!(
            "Delivered {} event ({} tokens) to {} in {duration_ms} ms",
            event.provider,
            event.total_tokens,
            reporter.endpoint()
        ),
    }
    Ok(())
}

fn build_event(args: &SendArgs) -> UsageEvent {
    UsageEvent::new(Provider::from_tag(&args.provider))
        .with_customer(args.customer_id.clone())
        .with_model(Some(args.model.clone()))
        .with_method("cmdrdata.send")
        .with_usage(TokenUsage::new(args.input_tokens, args.output_tokens))
}
