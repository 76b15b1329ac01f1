//! Token usage extraction from provider responses.
//!
//! Responses are inspected as JSON. Each provider reports usage under a
//! different shape; [`extract_usage`] walks a fixed table of known shapes
//! and returns the first one present.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token counts for one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt/input tokens.
    pub input_tokens: u64,
    /// Completion/output tokens.
    pub output_tokens: u64,
    /// Total tokens as reported, or input + output when not reported.
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Usage with the total derived from input and output.
    #[must_use]
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Usage with an explicit total.
    #[must_use]
    pub const fn with_total(input_tokens: u64, output_tokens: u64, total_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Whether no tokens were recorded at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0 && self.total_tokens == 0
    }
}

// =============================================================================
// Usage Shapes
// =============================================================================

/// Where a provider keeps its counts, relative to the response root.
///
/// A shape matches when its input or output count is present. Shapes with
/// neither key match on the total alone.
struct UsageShape {
    name: &'static str,
    container: &'static [&'static str],
    input: Option<&'static str>,
    output: Option<&'static str>,
    total: Option<&'static str>,
}

/// Known shapes, tried in order.
const USAGE_SHAPES: &[UsageShape] = &[
    // Cohere v2: billed units take precedence over raw token counts
    UsageShape {
        name: "cohere_v2",
        container: &["usage", "billed_units"],
        input: Some("input_tokens"),
        output: Some("output_tokens"),
        total: None,
    },
    UsageShape {
        name: "openai",
        container: &["usage"],
        input: Some("prompt_tokens"),
        output: Some("completion_tokens"),
        total: Some("total_tokens"),
    },
    // Anthropic, and OpenAI Responses-style payloads that add a total
    UsageShape {
        name: "anthropic",
        container: &["usage"],
        input: Some("input_tokens"),
        output: Some("output_tokens"),
        total: Some("total_tokens"),
    },
    UsageShape {
        name: "google",
        container: &["usage_metadata"],
        input: Some("prompt_token_count"),
        output: Some("candidates_token_count"),
        total: Some("total_token_count"),
    },
    UsageShape {
        name: "google_rest",
        container: &["usageMetadata"],
        input: Some("promptTokenCount"),
        output: Some("candidatesTokenCount"),
        total: Some("totalTokenCount"),
    },
    UsageShape {
        name: "cohere_v1",
        container: &["meta", "billed_units"],
        input: Some("input_tokens"),
        output: Some("output_tokens"),
        total: None,
    },
    UsageShape {
        name: "total_only",
        container: &["usage"],
        input: None,
        output: None,
        total: Some("total_tokens"),
    },
];

impl UsageShape {
    fn extract(&self, response: &Value) -> Option<TokenUsage> {
        let container = self
            .container
            .iter()
            .try_fold(response, |node, key| node.get(key))?;
        if !container.is_object() {
            return None;
        }

        let input = self.input.and_then(|key| count(container, key));
        let output = self.output.and_then(|key| count(container, key));
        let total = self.total.and_then(|key| count(container, key));

        let matched = if self.input.is_none() && self.output.is_none() {
            total.is_some()
        } else {
            input.is_some() || output.is_some()
        };
        if !matched {
            return None;
        }

        let input = input.unwrap_or(0);
        let output = output.unwrap_or(0);
        Some(total.map_or_else(
            || TokenUsage::new(input, output),
            |total| TokenUsage::with_total(input, output, total),
        ))
    }
}

fn count(container: &Value, key: &str) -> Option<u64> {
    container.get(key).and_then(Value::as_u64)
}

/// Extract token usage from a provider response.
///
/// Returns `None` when no known usage shape is present.
#[must_use]
pub fn extract_usage(response: &Value) -> Option<TokenUsage> {
    USAGE_SHAPES.iter().find_map(|shape| {
        let usage = shape.extract(response)?;
        tracing::debug!(shape = shape.name, ?usage, "Extracted token usage");
        Some(usage)
    })
}

/// Extract the model name from a provider response.
#[must_use]
pub fn extract_model(response: &Value) -> Option<String> {
    ["model", "model_version", "modelVersion"]
        .iter()
        .find_map(|key| response.get(key).and_then(Value::as_str))
        .filter(|model| !model.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_usage() {
        let response = json!({
            "model": "gpt-4o-mini",
            "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
        });
        assert_eq!(
            extract_usage(&response),
            Some(TokenUsage::with_total(10, 20, 30))
        );
        assert_eq!(extract_model(&response).as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn anthropic_usage_derives_total() {
        let response = json!({"usage": {"input_tokens": 15, "output_tokens": 25}});
        assert_eq!(extract_usage(&response), Some(TokenUsage::new(15, 25)));
        assert_eq!(extract_usage(&response).unwrap().total_tokens, 40);
    }

    #[test]
    fn google_usage_snake_and_camel_case() {
        let snake = json!({
            "usage_metadata": {
                "prompt_token_count": 5,
                "candidates_token_count": 15,
                "total_token_count": 20
            }
        });
        let camel = json!({
            "modelVersion": "gemini-1.5-flash",
            "usageMetadata": {
                "promptTokenCount": 12,
                "candidatesTokenCount": 18,
                "totalTokenCount": 30
            }
        });
        assert_eq!(extract_usage(&snake), Some(TokenUsage::with_total(5, 15, 20)));
        assert_eq!(extract_usage(&camel), Some(TokenUsage::with_total(12, 18, 30)));
        assert_eq!(extract_model(&camel).as_deref(), Some("gemini-1.5-flash"));
    }

    #[test]
    fn cohere_v1_meta_billed_units() {
        let response = json!({"meta": {"billed_units": {"input_tokens": 8, "output_tokens": 12}}});
        assert_eq!(extract_usage(&response), Some(TokenUsage::new(8, 12)));
    }

    #[test]
    fn cohere_v2_prefers_billed_units() {
        let response = json!({
            "id": "test-123",
            "usage": {
                "billed_units": {"input_tokens": 5, "output_tokens": 10},
                "tokens": {"input_tokens": 71, "output_tokens": 10}
            }
        });
        assert_eq!(extract_usage(&response), Some(TokenUsage::new(5, 10)));
    }

    #[test]
    fn partial_openai_usage_fills_zero() {
        let response = json!({"usage": {"prompt_tokens": 5}});
        assert_eq!(extract_usage(&response), Some(TokenUsage::new(5, 0)));
    }

    #[test]
    fn input_output_usage_with_total_keeps_counts() {
        let response = json!({
            "model": "gpt-4.1",
            "usage": {"input_tokens": 15, "output_tokens": 25, "total_tokens": 40}
        });
        assert_eq!(
            extract_usage(&response),
            Some(TokenUsage::with_total(15, 25, 40))
        );
    }

    #[test]
    fn total_only_usage() {
        let response = json!({"result": "success", "usage": {"total_tokens": 10}});
        assert_eq!(
            extract_usage(&response),
            Some(TokenUsage::with_total(0, 0, 10))
        );
    }

    #[test]
    fn no_usage_present() {
        assert_eq!(extract_usage(&json!({"text": "Generated response"})), None);
        assert_eq!(extract_usage(&json!("plain string")), None);
        assert_eq!(extract_usage(&json!({"usage": "n/a"})), None);
        assert_eq!(extract_model(&json!({"model": ""})), None);
    }
}
