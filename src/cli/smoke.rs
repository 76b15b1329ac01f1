//! Smoke command implementation.
//!
//! Offline self-checks covering detection, extraction, context handling and
//! the wrapper itself. Nothing is sent over the network.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::args::OutputFormat;
use crate::cli::print_json;
use crate::client::{CallOptions, CmdrData};
use crate::core::context::{customer_context, get_customer_context, metadata_context};
use crate::core::models::UsageEvent;
use crate::core::provider::Provider;
use crate::core::tracker::UsageReporter;
use crate::core::usage::{TokenUsage, extract_usage};
use crate::error::{CmdrDataError, Result};

type CheckResult = std::result::Result<(), String>;

const CHECKS: &[(&str, fn() -> CheckResult)] = &[
    ("provider detection", check_detection),
    ("usage extraction", check_extraction),
    ("context scoping", check_context),
    ("wrapper pass-through", check_pass_through),
    ("error tracking", check_error_tracking),
    ("reporter failure isolation", check_resilience),
];

#[derive(Debug, Serialize)]
struct CheckOutcome {
    name: &'static str,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    passed: usize,
    failed: usize,
    duration_ms: u64,
    checks: Vec<CheckOutcome>,
}

/// Execute the smoke command.
///
/// # Errors
///
/// Returns an error when any check fails.
pub fn execute(format: OutputFormat, pretty: bool) -> Result<()> {
    let started = Instant::now();
    let checks: Vec<CheckOutcome> = CHECKS
        .iter()
        .map(|&(name, check)| {
            let outcome = check();
            tracing::debug!(check = name, passed = outcome.is_ok(), "Smoke check finished");
            CheckOutcome {
                name,
                passed: outcome.is_ok(),
                detail: outcome.err(),
            }
        })
        .collect();

    let failed = checks.iter().filter(|c| !c.passed).count();
    let report = SmokeReport {
        passed: checks.len() - failed,
        failed,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        checks,
    };

    match format {
        OutputFormat::Json => print_json(&report, pretty)?,
        OutputFormat::Human => {
            for check in &report.checks {
                let mark = if check.passed { "ok  " } else { "FAIL" };
                match &check.detail {
                    Some(detail) => println!("[{mark}] {}: {detail}", check.name),
                    None => println!("[{mark}] {}", check.name),
                }
            }
            println!("{} passed, {} failed", report.passed, report.failed);
        }
    }

    if failed > 0 {
        return Err(CmdrDataError::Other(anyhow::anyhow!(
            "{failed} of {} smoke checks failed",
            report.checks.len()
        )));
    }
    Ok(())
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> CheckResult {
    if condition { Ok(()) } else { Err(message()) }
}

fn check_detection() -> CheckResult {
    let cases = [
        ("async_openai::Client", Provider::OpenAI),
        ("anthropic_sdk::Client", Provider::Anthropic),
        ("google_generativeai::GenerativeModel", Provider::Google),
        ("gemini_rs::Client", Provider::Google),
        ("cohere_rust::Cohere", Provider::Cohere),
        ("hf_hub::api::Api", Provider::HuggingFace),
        ("acme::Client", Provider::Unknown),
    ];
    for (path, expected) in cases {
        let detected = Provider::detect(path);
        ensure(detected == expected, || {
            format!("{path} detected as {detected}, expected {expected}")
        })?;
    }
    Ok(())
}

fn check_extraction() -> CheckResult {
    let cases = [
        (
            json!({"usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}}),
            TokenUsage::with_total(10, 20, 30),
        ),
        (
            json!({"usage": {"input_tokens": 15, "output_tokens": 25}}),
            TokenUsage::new(15, 25),
        ),
        (
            json!({"usage_metadata": {"prompt_token_count": 5, "candidates_token_count": 15, "total_token_count": 20}}),
            TokenUsage::with_total(5, 15, 20),
        ),
        (
            json!({"meta": {"billed_units": {"input_tokens": 8, "output_tokens": 12}}}),
            TokenUsage::new(8, 12),
        ),
        (
            json!({"usage": {"billed_units": {"input_tokens": 5, "output_tokens": 10}, "tokens": {"input_tokens": 71, "output_tokens": 10}}}),
            TokenUsage::new(5, 10),
        ),
    ];
    for (response, expected) in cases {
        let extracted = extract_usage(&response);
        ensure(extracted == Some(expected), || {
            format!("{response} extracted as {extracted:?}, expected {expected:?}")
        })?;
    }
    ensure(extract_usage(&json!({"result": "ok"})).is_none(), || {
        "usage found in a response without usage".to_string()
    })
}

fn check_context() -> CheckResult {
    let before = get_customer_context();
    {
        let _outer = customer_context("smoke-outer");
        {
            let _inner = customer_context("smoke-inner");
            ensure(
                get_customer_context().as_deref() == Some("smoke-inner"),
                || "inner customer context not visible".to_string(),
            )?;
        }
        ensure(
            get_customer_context().as_deref() == Some("smoke-outer"),
            || "outer customer context not restored".to_string(),
        )?;
    }
    ensure(get_customer_context() == before, || {
        "customer context leaked after guard dropped".to_string()
    })
}

/// Collects events in memory.
#[derive(Default)]
struct Collector(Mutex<Vec<UsageEvent>>);

impl Collector {
    fn take(&self) -> Vec<UsageEvent> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl UsageReporter for Collector {
    fn report(&self, event: UsageEvent) -> Result<()> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

struct Unreachable;

impl UsageReporter for Unreachable {
    fn report(&self, _event: UsageEvent) -> Result<()> {
        Err(CmdrDataError::Network("smoke: backend unreachable".to_string()))
    }
}

/// Stand-in provider client.
struct SmokeClient;

impl SmokeClient {
    #[allow(clippy::unused_self)]
    fn complete(&self) -> std::result::Result<Value, String> {
        Ok(json!({
            "model": "smoke-model",
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        }))
    }
}

fn wrap(reporter: Arc<dyn UsageReporter>) -> std::result::Result<CmdrData<SmokeClient>, String> {
    CmdrData::builder(SmokeClient)
        .provider(Provider::OpenAI)
        .customer_id("smoke-default")
        .disable_tracking(false)
        .reporter(reporter)
        .build()
        .map_err(|e| format!("wrapper construction failed: {e}"))
}

fn check_pass_through() -> CheckResult {
    let collector = Arc::new(Collector::default());
    let client = wrap(collector.clone())?;

    let direct = SmokeClient.complete()?;
    let _metadata = metadata_context(
        json!({"source": "smoke"})
            .as_object()
            .cloned()
            .unwrap_or_default(),
    );
    let tracked = client.track("complete", CallOptions::new(), SmokeClient::complete)?;
    ensure(tracked == direct, || "tracked response differs".to_string())?;

    let events = collector.take();
    ensure(events.len() == 1, || format!("{} events reported, expected 1", events.len()))?;
    let event = &events[0];
    ensure(event.total_tokens == 7, || format!("total_tokens = {}", event.total_tokens))?;
    ensure(event.model.as_deref() == Some("smoke-model"), || {
        format!("model = {:?}", event.model)
    })?;
    ensure(event.metadata.get("source") == Some(&json!("smoke")), || {
        "context metadata missing from event".to_string()
    })?;
    ensure(
        event.customer_id.as_deref().is_some(),
        || "customer id missing from event".to_string(),
    )
}

fn check_error_tracking() -> CheckResult {
    let collector = Arc::new(Collector::default());
    let client = wrap(collector.clone())?;

    let result: std::result::Result<Value, String> =
        client.track("complete", CallOptions::new(), |_| Err("boom".to_string()));
    ensure(result == Err("boom".to_string()), || {
        "error was not passed through unchanged".to_string()
    })?;

    let events = collector.take();
    ensure(
        events.len() == 1 && events[0].error_occurred,
        || "failed call was not reported as an error".to_string(),
    )?;
    ensure(events[0].error_message.as_deref() == Some("boom"), || {
        format!("error_message = {:?}", events[0].error_message)
    })
}

fn check_resilience() -> CheckResult {
    let client = wrap(Arc::new(Unreachable))?;
    let tracked = client.track("complete", CallOptions::new(), SmokeClient::complete)?;
    ensure(tracked["usage"]["total_tokens"] == 7, || {
        "response altered by failing reporter".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_checks_pass() {
        let _env = crate::test_utils::env_lock();
        for (name, check) in CHECKS {
            assert_eq!(check(), Ok(()), "{name}");
        }
    }
}
