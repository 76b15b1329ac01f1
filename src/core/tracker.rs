//! Usage reporters.
//!
//! A [`UsageReporter`] receives one [`UsageEvent`] per tracked call. The
//! wrapper never waits on delivery: [`HttpUsageReporter`] queues events to a
//! dedicated worker thread which POSTs them to the tracking backend in
//! order, retrying transient failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::{mpsc, oneshot};

use super::fingerprint::fingerprint;
use super::http::{build_client, post_event};
use super::models::UsageEvent;
use super::retry::RetryPolicy;
use crate::error::{CmdrDataError, Result};

/// Sink for usage events.
pub trait UsageReporter: Send + Sync {
    /// Hand off one event. Must not block on network I/O.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be accepted.
    fn report(&self, event: UsageEvent) -> Result<()>;

    /// Wait until previously reported events are processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the deadline passes first.
    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// Reporter used when tracking is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageReporter;

impl UsageReporter for NoopUsageReporter {
    fn report(&self, event: UsageEvent) -> Result<()> {
        tracing::trace!(provider = %event.provider, "Tracking disabled, dropping usage event");
        Ok(())
    }
}

// =============================================================================
// HTTP Reporter
// =============================================================================

/// Where and how events are delivered.
#[derive(Clone)]
pub struct DeliverySettings {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for DeliverySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliverySettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &fingerprint(&self.api_key))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Events accepted by the backend.
    pub delivered: u64,
    /// Events dropped after retries were exhausted or a permanent failure.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

enum Command {
    Deliver(Box<UsageEvent>),
    DeliverNow(Box<UsageEvent>, oneshot::Sender<Result<()>>),
    Flush(std_mpsc::SyncSender<()>),
}

struct Worker {
    client: Client,
    settings: DeliverySettings,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Deliver(event) => {
                    // Failures are already counted and logged in deliver().
                    let _ = self.deliver(&event).await;
                }
                Command::DeliverNow(event, reply) => {
                    let _ = reply.send(self.deliver(&event).await);
                }
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        tracing::debug!("Usage reporter worker stopped");
    }

    async fn deliver(&self, event: &UsageEvent) -> Result<()> {
        let settings = &self.settings;
        let result = settings
            .retry
            .run(|| {
                post_event(
                    &self.client,
                    &settings.endpoint,
                    &settings.api_key,
                    event,
                    settings.timeout,
                )
            })
            .await;

        match &result {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    provider = %event.provider,
                    total_tokens = event.total_tokens,
                    "Usage event delivered"
                );
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    provider = %event.provider,
                    code = err.error_code(),
                    error = %err,
                    "Dropping usage event"
                );
            }
        }
        result
    }
}

/// Reporter delivering events to the tracking backend over HTTP.
///
/// Cheap to share behind an `Arc`; one worker thread serves every wrapper
/// holding the same reporter. Queued events are lost if the process exits
/// before [`flush`](UsageReporter::flush) returns.
pub struct HttpUsageReporter {
    commands: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
    endpoint: String,
}

impl HttpUsageReporter {
    /// Start the delivery worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client, runtime or worker thread cannot
    /// be created.
    pub fn new(settings: DeliverySettings) -> Result<Self> {
        let client = build_client(settings.timeout)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (commands, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let endpoint = settings.endpoint.clone();

        tracing::debug!(
            endpoint = %settings.endpoint,
            api_key = %fingerprint(&settings.api_key),
            max_retries = settings.retry.max_retries,
            "Starting usage reporter"
        );

        let worker = Worker {
            client,
            settings,
            counters: Arc::clone(&counters),
        };
        std::thread::Builder::new()
            .name("cmdrdata-reporter".to_string())
            .spawn(move || runtime.block_on(worker.run(receiver)))?;

        Ok(Self {
            commands,
            counters,
            endpoint,
        })
    }

    /// Deliver one event and wait for the outcome. The event is ordered
    /// after everything already queued.
    ///
    /// # Errors
    ///
    /// Returns the delivery error after retries, or `ReporterClosed`.
    pub async fn send_now(&self, event: UsageEvent) -> Result<()> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::DeliverNow(Box::new(event), reply))
            .map_err(|_| CmdrDataError::ReporterClosed)?;
        outcome.await.map_err(|_| CmdrDataError::ReporterClosed)?
    }

    /// Delivery counters so far.
    #[must_use]
    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl UsageReporter for HttpUsageReporter {
    fn report(&self, event: UsageEvent) -> Result<()> {
        self.commands
            .send(Command::Deliver(Box::new(event)))
            .map_err(|_| CmdrDataError::ReporterClosed)
    }

    /// Blocks the calling thread; avoid calling from inside an async task.
    fn flush(&self, timeout: Duration) -> Result<()> {
        let (ack, done) = std_mpsc::sync_channel(1);
        self.commands
            .send(Command::Flush(ack))
            .map_err(|_| CmdrDataError::ReporterClosed)?;
        match done.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(CmdrDataError::FlushTimeout(timeout)),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(CmdrDataError::ReporterClosed),
        }
    }
}

impl std::fmt::Debug for HttpUsageReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUsageReporter")
            .field("endpoint", &self.endpoint)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::Provider;

    fn unreachable_settings() -> DeliverySettings {
        DeliverySettings {
            // Port 9 (discard) on localhost is refused on test machines.
            endpoint: "http://127.0.0.1:9/api/events".to_string(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_millis(200),
            retry: RetryPolicy::none(),
        }
    }

    #[test]
    fn noop_reporter_accepts_everything() {
        let reporter = NoopUsageReporter;
        assert!(reporter.report(UsageEvent::new(Provider::OpenAI)).is_ok());
        assert!(reporter.flush(Duration::from_millis(1)).is_ok());
    }

    #[test]
    fn report_returns_immediately_and_failure_is_counted() {
        let reporter = HttpUsageReporter::new(unreachable_settings()).unwrap();
        reporter.report(UsageEvent::new(Provider::OpenAI)).unwrap();
        reporter.flush(Duration::from_secs(5)).unwrap();

        let stats = reporter.stats();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn settings_debug_shows_fingerprint_only() {
        let settings = unreachable_settings();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("test-key"));
        assert!(debug.contains(&fingerprint("test-key")));
        assert!(debug.contains("127.0.0.1:9"));
    }

    #[test]
    fn debug_hides_api_key() {
        let reporter = HttpUsageReporter::new(unreachable_settings()).unwrap();
        let debug = format!("{reporter:?}");
        assert!(debug.contains("127.0.0.1:9"));
        assert!(!debug.contains("test-key"));
    }
}
