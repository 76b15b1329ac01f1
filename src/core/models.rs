//! Usage event payload sent to the tracking backend.
//!
//! See `schemas/usage-event-v1.schema.json` for the wire contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::Metadata;
use super::provider::Provider;
use super::usage::TokenUsage;

/// Crate version reported with every event.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One tracked provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Customer the call is billed to.
    pub customer_id: Option<String>,
    /// Provider tag.
    pub provider: Provider,
    /// Model reported by the response, or supplied by the caller.
    pub model: Option<String>,
    /// Caller-supplied label for the wrapped operation.
    pub method: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// Merged default, context and call metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Call completion time.
    pub timestamp: DateTime<Utc>,
    /// Wall time of the wrapped call in milliseconds.
    pub duration_ms: u64,
    pub error_occurred: bool,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub sdk_version: String,
}

impl UsageEvent {
    /// Event for a completed call with no usage recorded yet.
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            customer_id: None,
            provider,
            model: None,
            method: None,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            metadata: Metadata::new(),
            timestamp: Utc::now(),
            duration_ms: 0,
            error_occurred: false,
            error_type: None,
            error_message: None,
            sdk_version: SDK_VERSION.to_string(),
        }
    }

    #[must_use]
    pub fn with_customer(mut self, customer_id: Option<String>) -> Self {
        self.customer_id = customer_id;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub const fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.input_tokens = usage.input_tokens;
        self.output_tokens = usage.output_tokens;
        self.total_tokens = usage.total_tokens;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub const fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Mark the event as a failed call.
    #[must_use]
    pub fn with_error(mut self, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_occurred = true;
        self.error_type = Some(error_type.into());
        self.error_message = Some(message.into());
        self
    }

    /// Token counts carried by this event.
    #[must_use]
    pub const fn usage(&self) -> TokenUsage {
        TokenUsage::with_total(self.input_tokens, self.output_tokens, self.total_tokens)
    }
}
