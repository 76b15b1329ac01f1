//! HTTP client utilities.
//!
//! Provides the shared client used to deliver usage events.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, StatusCode};

use super::models::UsageEvent;
use crate::error::{CmdrDataError, Result};

/// Default timeout for event delivery.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// User agent sent to the tracking backend.
#[must_use]
pub fn user_agent() -> String {
    format!("cmdrdata-rust/{}", env!("CARGO_PKG_VERSION"))
}

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(user_agent())
        .build()
        .map_err(|e| CmdrDataError::Network(e.to_string()))
}

/// POST one usage event to the tracking endpoint.
///
/// # Errors
///
/// Returns a classified error for transport failures and non-2xx responses.
pub async fn post_event(
    client: &Client,
    endpoint: &str,
    api_key: &str,
    event: &UsageEvent,
    timeout: Duration,
) -> Result<()> {
    let response = client
        .post(endpoint)
        .header(AUTHORIZATION, format!("Bearer {api_key}"))
        .header(CONTENT_TYPE, "application/json")
        .json(event)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                CmdrDataError::Timeout(timeout)
            } else {
                CmdrDataError::Network(e.to_string())
            }
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let message = response.text().await.unwrap_or_default();

    Err(classify_status(status, retry_after, timeout, message))
}

/// Map a non-success backend status to an error.
///
/// A backend-side 408 is reported against the configured `timeout`.
#[must_use]
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    timeout: Duration,
    message: String,
) -> CmdrDataError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CmdrDataError::AuthRejected {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => CmdrDataError::RateLimited { retry_after },
        StatusCode::REQUEST_TIMEOUT => CmdrDataError::Timeout(timeout),
        s if s.is_server_error() => CmdrDataError::BackendUnavailable {
            status: s.as_u16(),
            message,
        },
        s => CmdrDataError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}
