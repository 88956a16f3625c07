//! Language model provider identifiers

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Known model providers.
///
/// Identifiers that match none of the known providers map to `Unknown`,
/// which every lookup table handles with a conservative default. Deserialization
/// goes through [`Provider::from_id`], so aliases and any casing are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Provider {
    Anthropic,
    OpenAi,
    Google,
    Mistral,
    DeepSeek,
    OpenRouter,
    Ollama,
    LmStudio,
    #[default]
    Unknown,
}

impl Provider {
    /// All known providers, excluding `Unknown`
    pub const KNOWN: [Provider; 8] = [
        Provider::Anthropic,
        Provider::OpenAi,
        Provider::Google,
        Provider::Mistral,
        Provider::DeepSeek,
        Provider::OpenRouter,
        Provider::Ollama,
        Provider::LmStudio,
    ];

    /// Parse a provider identifier, case-insensitively.
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Provider::Anthropic,
            "openai" | "open-ai" | "azure" => Provider::OpenAi,
            "google" | "gemini" | "vertex" => Provider::Google,
            "mistral" => Provider::Mistral,
            "deepseek" => Provider::DeepSeek,
            "openrouter" => Provider::OpenRouter,
            "ollama" => Provider::Ollama,
            "lmstudio" | "lm-studio" | "lm_studio" => Provider::LmStudio,
            _ => Provider::Unknown,
        }
    }

    /// Stable lowercase identifier, used for metric labels and serialization
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
            Provider::Google => "google",
            Provider::Mistral => "mistral",
            Provider::DeepSeek => "deepseek",
            Provider::OpenRouter => "openrouter",
            Provider::Ollama => "ollama",
            Provider::LmStudio => "lmstudio",
            Provider::Unknown => "unknown",
        }
    }

    /// Whether models from this provider run on the user's own machine
    pub fn is_local(&self) -> bool {
        matches!(self, Provider::Ollama | Provider::LmStudio)
    }
}

impl FromStr for Provider {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_id(s))
    }
}

impl From<String> for Provider {
    fn from(id: String) -> Self {
        Self::from_id(&id)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
