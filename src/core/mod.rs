//! Provider detection, usage extraction, context and event delivery.

pub mod context;
pub mod fingerprint;
pub mod http;
pub mod logging;
pub mod models;
pub mod provider;
pub mod retry;
pub mod tracker;
pub mod usage;

pub use context::{
    CustomerContextGuard, Metadata, MetadataContextGuard, clear_customer_context,
    clear_metadata_context, customer_context, get_customer_context, get_metadata_context,
    metadata_context, scope_customer, scope_metadata, set_customer_context, set_metadata_context,
};
pub use models::{SDK_VERSION, UsageEvent};
pub use provider::{Provider, ProviderRegistry};
pub use retry::RetryPolicy;
pub use tracker::{
    DeliverySettings, DeliveryStats, HttpUsageReporter, NoopUsageReporter, UsageReporter,
};
pub use usage::{TokenUsage, extract_model, extract_usage};
