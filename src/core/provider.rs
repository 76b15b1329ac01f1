//! Provider tags and the detection table.
//!
//! A wrapped client's provider is detected from its type path, the way
//! `async_openai::client::Client<..>` names the crate it came from.
//! Detection is an ordered substring table; callers can extend it through
//! [`ProviderRegistry::register`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// =============================================================================
// Provider Enum
// =============================================================================

/// AI provider whose client is being wrapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAI,
    Anthropic,
    Google,
    Cohere,
    HuggingFace,
    /// Any provider outside the built-in set, tagged verbatim.
    Custom(String),
    /// Nothing in the detection table matched.
    #[default]
    Unknown,
}

impl Provider {
    /// Built-in providers in display order.
    pub const BUILT_IN: &'static [Self] = &[
        Self::OpenAI,
        Self::Anthropic,
        Self::Google,
        Self::Cohere,
        Self::HuggingFace,
    ];

    /// Tag sent to the tracking backend.
    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Cohere => "cohere",
            Self::HuggingFace => "huggingface",
            Self::Custom(name) => name,
            Self::Unknown => "unknown",
        }
    }

    /// Display name for human output.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Google => "Google",
            Self::Cohere => "Cohere",
            Self::HuggingFace => "Hugging Face",
            Self::Custom(name) => name,
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a provider tag (case-insensitive).
    ///
    /// Unrecognised non-empty tags become [`Provider::Custom`]; an empty tag
    /// is [`Provider::Unknown`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let trimmed = tag.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "unknown" => Self::Unknown,
            "openai" => Self::OpenAI,
            "anthropic" => Self::Anthropic,
            "google" | "gemini" | "vertex" => Self::Google,
            "cohere" => Self::Cohere,
            "huggingface" | "hf" => Self::HuggingFace,
            _ => Self::Custom(trimmed.to_string()),
        }
    }

    /// Detect a provider from a type or module path using the built-in table.
    #[must_use]
    pub fn detect(type_path: &str) -> Self {
        detect_in(BUILT_IN_RULES.iter().map(|(n, p)| (*n, p)), type_path)
    }

    /// Detect a provider from the type of `C`.
    #[must_use]
    pub fn detect_type<C: ?Sized>() -> Self {
        Self::detect(std::any::type_name::<C>())
    }

    /// Whether detection or the caller produced a real provider tag.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for Provider {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for Provider {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

impl From<&str> for Provider {
    fn from(tag: &str) -> Self {
        Self::from_tag(tag)
    }
}

impl From<String> for Provider {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

// =============================================================================
// Detection Table
// =============================================================================

/// Built-in detection rules. Order matters: first match wins.
const BUILT_IN_RULES: &[(&str, Provider)] = &[
    ("openai", Provider::OpenAI),
    ("anthropic", Provider::Anthropic),
    ("google", Provider::Google),
    ("generativeai", Provider::Google),
    ("gemini", Provider::Google),
    ("cohere", Provider::Cohere),
    ("huggingface", Provider::HuggingFace),
    ("hf_hub", Provider::HuggingFace),
];

fn detect_in<'a>(
    rules: impl IntoIterator<Item = (&'a str, &'a Provider)>,
    type_path: &str,
) -> Provider {
    let haystack = type_path.to_lowercase();
    rules
        .into_iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map_or(Provider::Unknown, |(_, provider)| provider.clone())
}

// =============================================================================
// Provider Registry
// =============================================================================

/// Detection table with caller-registered rules layered over the built-ins.
///
/// Registered rules are consulted first, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    custom: Vec<(String, Provider)>,
}

impl ProviderRegistry {
    /// Registry holding only the built-in rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule mapping a type-path substring to a provider.
    ///
    /// Needles are matched case-insensitively. Empty needles are ignored.
    pub fn register(
        &mut self,
        needle: impl Into<String>,
        provider: impl Into<Provider>,
    ) -> &mut Self {
        let needle = needle.into().trim().to_lowercase();
        if needle.is_empty() {
            tracing::debug!("Ignoring empty provider detection needle");
            return self;
        }
        self.custom.push((needle, provider.into()));
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with_rule(mut self, needle: impl Into<String>, provider: impl Into<Provider>) -> Self {
        self.register(needle, provider);
        self
    }

    /// Detect a provider from a type or module path.
    #[must_use]
    pub fn detect(&self, type_path: &str) -> Provider {
        let rules = self
            .custom
            .iter()
            .map(|(n, p)| (n.as_str(), p))
            .chain(BUILT_IN_RULES.iter().map(|(n, p)| (*n, p)));
        let provider = detect_in(rules, type_path);
        tracing::debug!(type_path, provider = %provider, "Detected provider");
        provider
    }

    /// Detect a provider from the type of `C`.
    #[must_use]
    pub fn detect_type<C: ?Sized>(&self) -> Provider {
        self.detect(std::any::type_name::<C>())
    }

    /// Number of caller-registered rules.
    #[must_use]
    pub fn custom_rule_count(&self) -> usize {
        self.custom.len()
    }
}
