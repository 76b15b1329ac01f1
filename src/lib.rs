//! cmdrdata - usage tracking for AI provider clients
//!
//! Wraps an existing provider client (OpenAI, Anthropic, Google, Cohere,
//! Hugging Face, or anything else), detects the provider from the client
//! type, extracts token usage from each response and reports it to the
//! cmdrdata tracking backend in the background.

// Note: deny (not forbid) to allow #[allow(unsafe_code)] in test helpers for env var manipulation
#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod client;
pub mod core;
pub mod error;
pub mod storage;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{CallOptions, CmdrData, CmdrDataBuilder, track_ai};
pub use core::context::{
    Metadata, clear_customer_context, clear_metadata_context, customer_context,
    get_customer_context, get_metadata_context, metadata_context, scope_customer, scope_metadata,
    set_customer_context, set_metadata_context,
};
pub use core::models::UsageEvent;
pub use core::provider::{Provider, ProviderRegistry};
pub use core::tracker::{HttpUsageReporter, NoopUsageReporter, UsageReporter};
pub use core::usage::TokenUsage;
pub use error::{CmdrDataError, ExitCode, Result};
