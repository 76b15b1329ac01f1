//! Test utilities for cmdrdata.
//!
//! Provides in-memory reporters, provider response fixtures, and an
//! environment lock for tests that touch `CMDRDATA_*` variables.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cmdrdata::test_utils::*;
//!
//! let recorder = Arc::new(RecordingReporter::new());
//! let client = CmdrData::builder(client).reporter(recorder.clone()).build()?;
//! client.record("chat", CallOptions::new(), &fixtures::openai_chat_completion());
//! assert_eq!(recorder.events()[0].total_tokens, 30);
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::core::models::UsageEvent;
use crate::core::tracker::UsageReporter;
use crate::error::{CmdrDataError, Result};

// =============================================================================
// Reporters
// =============================================================================

/// Reporter keeping every event in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<UsageEvent>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events reported so far.
    #[must_use]
    pub fn events(&self) -> Vec<UsageEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent event, if any.
    #[must_use]
    pub fn last(&self) -> Option<UsageEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UsageReporter for RecordingReporter {
    fn report(&self, event: UsageEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

/// Reporter that rejects every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingReporter;

impl UsageReporter for FailingReporter {
    fn report(&self, _event: UsageEvent) -> Result<()> {
        Err(CmdrDataError::Network("tracking backend unreachable".to_string()))
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        Err(CmdrDataError::FlushTimeout(timeout))
    }
}

// =============================================================================
// Environment
// =============================================================================

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Serialize tests that read or write process environment variables.
pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Config file contents pointing at `endpoint`.
#[must_use]
pub fn make_test_config_toml(endpoint: &str) -> String {
    format!(
        r#"[tracking]
api_key = "file-key"
endpoint = "{endpoint}"
timeout_seconds = 2
max_retries = 0
"#
    )
}

// =============================================================================
// Provider Response Fixtures
// =============================================================================

/// Provider responses as they appear on the wire.
pub mod fixtures {
    use serde_json::{Value, json};

    /// OpenAI chat completion: 10 in, 20 out, 30 total.
    #[must_use]
    pub fn openai_chat_completion() -> Value {
        json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
        })
    }

    /// Anthropic message: 15 in, 25 out.
    #[must_use]
    pub fn anthropic_message() -> Value {
        json!({
            "id": "msg_123",
            "type": "message",
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "Hello"}],
            "usage": {"input_tokens": 15, "output_tokens": 25}
        })
    }

    /// Google `generate_content` (SDK snake_case): 5 in, 15 out, 20 total.
    #[must_use]
    pub fn google_generate_content() -> Value {
        json!({
            "model_version": "gemini-1.5-flash",
            "candidates": [{"content": {"parts": [{"text": "Hello"}]}}],
            "usage_metadata": {
                "prompt_token_count": 5,
                "candidates_token_count": 15,
                "total_token_count": 20
            }
        })
    }

    /// Google REST (camelCase) response: 5 in, 15 out, 20 total.
    #[must_use]
    pub fn google_rest_generate_content() -> Value {
        json!({
            "modelVersion": "gemini-1.5-pro",
            "candidates": [{"content": {"parts": [{"text": "Hello"}]}}],
            "usageMetadata": {
                "promptTokenCount": 5,
                "candidatesTokenCount": 15,
                "totalTokenCount": 20
            }
        })
    }

    /// Cohere v1 chat: billed 8 in, 12 out.
    #[must_use]
    pub fn cohere_v1_chat() -> Value {
        json!({
            "text": "Hello",
            "meta": {"billed_units": {"input_tokens": 8, "output_tokens": 12}}
        })
    }

    /// Cohere v2 chat: billed 5 in, 10 out; raw token counts differ.
    #[must_use]
    pub fn cohere_v2_chat() -> Value {
        json!({
            "id": "c14c80c3",
            "message": {"role": "assistant", "content": [{"type": "text", "text": "Hello"}]},
            "usage": {
                "billed_units": {"input_tokens": 5, "output_tokens": 10},
                "tokens": {"input_tokens": 71, "output_tokens": 10}
            }
        })
    }

    /// Response with no usage information.
    #[must_use]
    pub fn no_usage() -> Value {
        json!({"result": "success"})
    }
}
