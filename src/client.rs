//! Usage-tracking wrapper around an AI provider client.
//!
//! [`CmdrData`] owns the provider client and derefs to it, so untracked
//! calls go straight through. Calls made via [`CmdrData::track`] or
//! [`CmdrData::track_async`] are timed, their responses inspected for token
//! usage, and one [`UsageEvent`] is handed to the reporter. The caller always
//! gets the provider's own result back, whatever happens to the event.
//!
//! ```rust,ignore
//! use cmdrdata::{CallOptions, track_ai};
//!
//! let client = track_ai(openai::Client::new(), "tk-...")?;
//! let response = client
//!     .track_async("chat.completions.create", CallOptions::new(), |c| {
//!         c.chat().create(request)
//!     })
//!     .await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use crate::core::context::{Metadata, get_customer_context, get_metadata_context, merge_into};
use crate::core::models::UsageEvent;
use crate::core::provider::{Provider, ProviderRegistry};
use crate::core::tracker::{HttpUsageReporter, NoopUsageReporter, UsageReporter};
use crate::core::usage::{extract_model, extract_usage};
use crate::error::Result;
use crate::storage::config::{ConfigOverrides, TrackerConfig};

// =============================================================================
// Call Options
// =============================================================================

/// Per-call tracking options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides context and wrapper customer ids.
    pub customer_id: Option<String>,
    /// Merged over wrapper and context metadata.
    pub metadata: Metadata,
    /// Used when the response carries no model name.
    pub model: Option<String>,
}

impl CallOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        merge_into(&mut self.metadata, metadata);
        self
    }

    /// Add a single metadata entry.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Customer and metadata resolved when a call starts.
struct Attribution {
    customer_id: Option<String>,
    metadata: Metadata,
    model: Option<String>,
}

// =============================================================================
// Wrapper
// =============================================================================

/// A provider client with usage tracking attached.
pub struct CmdrData<C> {
    client: C,
    provider: Provider,
    customer_id: Option<String>,
    metadata: Metadata,
    reporter: Arc<dyn UsageReporter>,
    tracking_enabled: bool,
}

/// Wrap `client`, reporting usage with `api_key`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the reporter cannot
/// start.
pub fn track_ai<C>(client: C, api_key: impl Into<String>) -> Result<CmdrData<C>> {
    CmdrData::builder(client).api_key(api_key).build()
}

impl<C> CmdrData<C> {
    /// Start configuring a wrapper around `client`.
    pub fn builder(client: C) -> CmdrDataBuilder<C> {
        CmdrDataBuilder::new(client)
    }

    /// Provider events are attributed to.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The wrapped client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Unwrap, dropping the tracking layer.
    pub fn into_inner(self) -> C {
        self.client
    }

    #[must_use]
    pub const fn is_tracking_enabled(&self) -> bool {
        self.tracking_enabled
    }

    /// Wait for queued events to be delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the reporter does not drain within `timeout`.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.reporter.flush(timeout)
    }

    /// Run a synchronous provider call and track it.
    ///
    /// # Errors
    ///
    /// Returns the provider call's own error, unchanged.
    pub fn track<R, E, F>(
        &self,
        method: &str,
        options: CallOptions,
        call: F,
    ) -> std::result::Result<R, E>
    where
        F: FnOnce(&C) -> std::result::Result<R, E>,
        R: Serialize,
        E: Display,
    {
        let attribution = self.attribute(options);
        let started = Instant::now();
        let outcome = call(&self.client);
        self.finish(method, attribution, &outcome, started.elapsed());
        outcome
    }

    /// Run an async provider call and track it.
    ///
    /// Customer and metadata context are read before the call starts.
    ///
    /// # Errors
    ///
    /// Returns the provider call's own error, unchanged.
    pub async fn track_async<'a, R, E, F, Fut>(
        &'a self,
        method: &str,
        options: CallOptions,
        call: F,
    ) -> std::result::Result<R, E>
    where
        F: FnOnce(&'a C) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        R: Serialize,
        E: Display,
    {
        let attribution = self.attribute(options);
        let started = Instant::now();
        let outcome = call(&self.client).await;
        self.finish(method, attribution, &outcome, started.elapsed());
        outcome
    }

    /// Track a response obtained without going through the wrapper.
    pub fn record<R: Serialize>(&self, method: &str, options: CallOptions, response: &R) {
        if !self.tracking_enabled {
            return;
        }
        let attribution = self.attribute(options);
        let event = self.success_event(method, attribution, response, Duration::ZERO);
        self.dispatch(event);
    }

    fn attribute(&self, options: CallOptions) -> Attribution {
        let customer_id = options
            .customer_id
            .or_else(get_customer_context)
            .or_else(|| self.customer_id.clone());

        let mut metadata = self.metadata.clone();
        merge_into(&mut metadata, get_metadata_context());
        merge_into(&mut metadata, options.metadata);

        Attribution {
            customer_id,
            metadata,
            model: options.model,
        }
    }

    fn finish<R: Serialize, E: Display>(
        &self,
        method: &str,
        attribution: Attribution,
        outcome: &std::result::Result<R, E>,
        elapsed: Duration,
    ) {
        if !self.tracking_enabled {
            return;
        }
        let event = match outcome {
            Ok(response) => self.success_event(method, attribution, response, elapsed),
            Err(err) => self
                .base_event(method, attribution, elapsed)
                .with_error(short_type_name::<E>(), err.to_string()),
        };
        self.dispatch(event);
    }

    fn base_event(&self, method: &str, attribution: Attribution, elapsed: Duration) -> UsageEvent {
        UsageEvent::new(self.provider.clone())
            .with_customer(attribution.customer_id)
            .with_model(attribution.model)
            .with_method(method)
            .with_metadata(attribution.metadata)
            .with_duration_ms(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }

    fn success_event<R: Serialize>(
        &self,
        method: &str,
        attribution: Attribution,
        response: &R,
        elapsed: Duration,
    ) -> UsageEvent {
        let fallback_model = attribution.model.clone();
        let event = self.base_event(method, attribution, elapsed);

        let value = match serde_json::to_value(response) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(method, error = %err, "Could not inspect provider response");
                return event;
            }
        };

        let event = event.with_model(extract_model(&value).or(fallback_model));
        match extract_usage(&value) {
            Some(usage) => event.with_usage(usage),
            None => {
                tracing::debug!(method, provider = %self.provider, "No token usage in response");
                event
            }
        }
    }

    fn dispatch(&self, event: UsageEvent) {
        tracing::debug!(
            provider = %event.provider,
            method = event.method.as_deref().unwrap_or(""),
            total_tokens = event.total_tokens,
            error = event.error_occurred,
            "Reporting usage event"
        );
        if let Err(err) = self.reporter.report(event) {
            tracing::warn!(code = err.error_code(), error = %err, "Failed to report usage event");
        }
    }
}

impl<C> Deref for CmdrData<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.client
    }
}

impl<C> std::fmt::Debug for CmdrData<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdrData")
            .field("client", &std::any::type_name::<C>())
            .field("provider", &self.provider)
            .field("customer_id", &self.customer_id)
            .field("tracking_enabled", &self.tracking_enabled)
            .finish_non_exhaustive()
    }
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

// =============================================================================
// Builder
// =============================================================================

/// Configures a [`CmdrData`] wrapper.
pub struct CmdrDataBuilder<C> {
    client: C,
    overrides: ConfigOverrides,
    provider: Option<Provider>,
    auto_detect_provider: bool,
    customer_id: Option<String>,
    metadata: Metadata,
    reporter: Option<Arc<dyn UsageReporter>>,
    registry: ProviderRegistry,
}

impl<C> CmdrDataBuilder<C> {
    fn new(client: C) -> Self {
        Self {
            client,
            overrides: ConfigOverrides::default(),
            provider: None,
            auto_detect_provider: true,
            customer_id: None,
            metadata: Metadata::new(),
            reporter: None,
            registry: ProviderRegistry::new(),
        }
    }

    /// Tracking API key. Falls back to `CMDRDATA_API_KEY`.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.overrides.api_key = Some(api_key.into());
        self
    }

    /// Attribute events to `provider` instead of detecting it.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<Provider>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub const fn auto_detect_provider(mut self, enabled: bool) -> Self {
        self.auto_detect_provider = enabled;
        self
    }

    /// Default customer id, used when neither the call nor context sets one.
    #[must_use]
    pub fn customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Default metadata attached to every event.
    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub const fn disable_tracking(mut self, disabled: bool) -> Self {
        self.overrides.disable_tracking = Some(disabled);
        self
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.overrides.endpoint = Some(endpoint.into());
        self
    }

    /// Per-request timeout for event delivery.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.overrides.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.overrides.max_retries = Some(max_retries);
        self
    }

    /// Config file to read instead of the default location.
    #[must_use]
    pub fn config_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.overrides.config_path = Some(path.into());
        self
    }

    /// Deliver events through `reporter` instead of HTTP. No API key is
    /// required in that case.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn UsageReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Detection rules used when auto-detecting the provider.
    #[must_use]
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Resolve configuration and start tracking.
    ///
    /// # Errors
    ///
    /// Returns `MissingApiKey` when tracking is enabled with the HTTP
    /// reporter and no key is configured, or a configuration error for
    /// invalid settings.
    pub fn build(self) -> Result<CmdrData<C>> {
        let config = TrackerConfig::resolve(&self.overrides)?;

        let provider = match self.provider {
            Some(provider) => provider,
            None if self.auto_detect_provider => self.registry.detect_type::<C>(),
            None => Provider::Unknown,
        };

        let reporter: Arc<dyn UsageReporter> = if config.disable_tracking {
            Arc::new(NoopUsageReporter)
        } else if let Some(reporter) = self.reporter {
            reporter
        } else {
            Arc::new(HttpUsageReporter::new(config.delivery_settings()?)?)
        };

        tracing::debug!(
            client = std::any::type_name::<C>(),
            provider = %provider,
            tracking = !config.disable_tracking,
            "Wrapped AI client"
        );

        Ok(CmdrData {
            client: self.client,
            provider,
            customer_id: self.customer_id,
            metadata: self.metadata,
            reporter,
            tracking_enabled: !config.disable_tracking,
        })
    }
}
