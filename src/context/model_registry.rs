//! Model context capacities
//!
//! A built-in table maps (provider, model) to the model's total context
//! window. Lookups never fail: an unknown model falls back to its provider's
//! default, and an unknown provider falls back to [`GLOBAL_DEFAULT_CONTEXT`].
//! Deployments can layer their own capacities on top via [`ModelRegistry`].

use super::provider::Provider;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Capacity assumed for a provider nobody has heard of
pub const GLOBAL_DEFAULT_CONTEXT: usize = 4_096;

/// Windows at or above this size count as extended context
pub const EXTENDED_CONTEXT_THRESHOLD: usize = 100_000;

/// Share of the window reserved for the response by default
pub const RESPONSE_RESERVE_RATIO: f64 = 0.10;
pub const MIN_RESPONSE_RESERVE: usize = 512;
pub const MAX_RESPONSE_RESERVE: usize = 8_192;

/// Context capacity of one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapacity {
    pub provider: Provider,
    pub model: String,
    pub total_tokens: usize,
    pub extended: bool,
}

impl ModelCapacity {
    pub fn new(provider: Provider, model: impl Into<String>, total_tokens: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            total_tokens,
            extended: total_tokens >= EXTENDED_CONTEXT_THRESHOLD,
        }
    }
}

type CapacityTable = IndexMap<Provider, IndexMap<&'static str, usize>>;

static BUILTIN_CAPACITIES: Lazy<CapacityTable> = Lazy::new(|| {
    use Provider::*;
    let entries = [
        // Anthropic
        ((Anthropic, "claude-opus-4"), 200_000),
        ((Anthropic, "claude-sonnet-4"), 200_000),
        ((Anthropic, "claude-3-7-sonnet"), 200_000),
        ((Anthropic, "claude-3-5-sonnet"), 200_000),
        ((Anthropic, "claude-3-5-haiku"), 200_000),
        ((Anthropic, "claude-3-opus"), 200_000),
        ((Anthropic, "claude-3-haiku"), 200_000),
        // OpenAI
        ((OpenAi, "gpt-4.1"), 1_047_576),
        ((OpenAi, "gpt-4o"), 128_000),
        ((OpenAi, "gpt-4o-mini"), 128_000),
        ((OpenAi, "gpt-4-turbo"), 128_000),
        ((OpenAi, "gpt-4"), 8_192),
        ((OpenAi, "gpt-3.5-turbo"), 16_385),
        ((OpenAi, "o1"), 200_000),
        ((OpenAi, "o3-mini"), 200_000),
        // Google
        ((Google, "gemini-2.5-pro"), 1_048_576),
        ((Google, "gemini-2.0-flash"), 1_048_576),
        ((Google, "gemini-1.5-pro"), 2_097_152),
        ((Google, "gemini-1.5-flash"), 1_048_576),
        ((Google, "gemini-pro"), 32_760),
        // Mistral
        ((Mistral, "mistral-large-latest"), 128_000),
        ((Mistral, "mistral-small-latest"), 32_000),
        ((Mistral, "open-mistral-nemo"), 128_000),
        // DeepSeek
        ((DeepSeek, "deepseek-chat"), 64_000),
        ((DeepSeek, "deepseek-reasoner"), 64_000),
        // OpenRouter
        ((OpenRouter, "anthropic/claude-3.5-sonnet"), 200_000),
        ((OpenRouter, "openai/gpt-4o"), 128_000),
        ((OpenRouter, "meta-llama/llama-3.1-70b-instruct"), 131_072),
        // Local runtimes use their default context length, not the model's maximum
        ((Ollama, "llama2"), 4_096),
        ((Ollama, "llama3"), 8_192),
        ((Ollama, "llama3.1"), 8_192),
        ((Ollama, "mistral"), 8_192),
        ((Ollama, "gemma2"), 8_192),
        ((Ollama, "phi3"), 4_096),
        ((Ollama, "qwen2.5"), 32_768),
        ((LmStudio, "local-model"), 4_096),
    ];

    let mut table = CapacityTable::new();
    for ((provider, model), total) in entries {
        table.entry(provider).or_default().insert(model, total);
    }
    table
});

/// Capacity used for models a provider offers that are missing from the table
pub fn provider_default_context(provider: Provider) -> usize {
    match provider {
        Provider::Anthropic => 200_000,
        Provider::OpenAi => 128_000,
        Provider::Google => 1_048_576,
        Provider::Mistral => 32_000,
        Provider::DeepSeek => 64_000,
        Provider::OpenRouter => 128_000,
        Provider::Ollama => 4_096,
        Provider::LmStudio => 4_096,
        Provider::Unknown => GLOBAL_DEFAULT_CONTEXT,
    }
}

fn builtin_lookup(provider: Provider, model: &str) -> Option<usize> {
    let model = model.trim().to_ascii_lowercase();
    BUILTIN_CAPACITIES
        .get(&provider)
        .and_then(|models| models.get(model.as_str()))
        .copied()
}

/// Response reserve applied when the caller does not choose one:
/// 10% of the window, clamped to [512, 8192], never more than half the window.
pub fn default_response_reserve(total_tokens: usize) -> usize {
    let proportional = (total_tokens as f64 * RESPONSE_RESERVE_RATIO) as usize;
    proportional
        .clamp(MIN_RESPONSE_RESERVE, MAX_RESPONSE_RESERVE)
        .min(total_tokens / 2)
}

/// Total context window for a model.
pub fn get_model_context_limit(provider: Provider, model: &str) -> usize {
    builtin_lookup(provider, model).unwrap_or_else(|| provider_default_context(provider))
}

/// Tokens available for input once `response_reserve` is set aside.
///
/// `None` applies [`default_response_reserve`]. A reserve at or above the
/// window leaves nothing for input.
pub fn get_safe_input_limit(
    provider: Provider,
    model: &str,
    response_reserve: Option<usize>,
) -> usize {
    safe_input_limit(get_model_context_limit(provider, model), response_reserve)
}

/// Whether a model has a large (100k+) context window
pub fn has_extended_context(provider: Provider, model: &str) -> bool {
    get_model_context_limit(provider, model) >= EXTENDED_CONTEXT_THRESHOLD
}

fn safe_input_limit(total: usize, response_reserve: Option<usize>) -> usize {
    let reserve = response_reserve.unwrap_or_else(|| default_response_reserve(total));
    total.saturating_sub(reserve)
}

/// Built-in capacities with deployment overrides layered on top
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: IndexMap<(Provider, String), usize>,
    provider_defaults: IndexMap<Provider, usize>,
}

impl ModelRegistry {
    /// Registry with only the built-in table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the capacity of a single model
    pub fn with_model(mut self, provider: Provider, model: &str, total_tokens: usize) -> Self {
        self.models
            .insert((provider, model.trim().to_ascii_lowercase()), total_tokens);
        self
    }

    /// Replace the fallback capacity for a provider's unlisted models
    pub fn with_provider_default(mut self, provider: Provider, total_tokens: usize) -> Self {
        self.provider_defaults.insert(provider, total_tokens);
        self
    }

    /// Number of overrides layered over the built-in table
    pub fn override_count(&self) -> usize {
        self.models.len() + self.provider_defaults.len()
    }

    pub fn context_limit(&self, provider: Provider, model: &str) -> usize {
        let key = (provider, model.trim().to_ascii_lowercase());
        if let Some(total) = self.models.get(&key) {
            return *total;
        }
        if let Some(total) = builtin_lookup(provider, model) {
            return total;
        }
        self.provider_defaults
            .get(&provider)
            .copied()
            .unwrap_or_else(|| provider_default_context(provider))
    }

    pub fn capacity(&self, provider: Provider, model: &str) -> ModelCapacity {
        ModelCapacity::new(provider, model, self.context_limit(provider, model))
    }

    pub fn safe_input_limit(
        &self,
        provider: Provider,
        model: &str,
        response_reserve: Option<usize>,
    ) -> usize {
        safe_input_limit(self.context_limit(provider, model), response_reserve)
    }

    pub fn has_extended_context(&self, provider: Provider, model: &str) -> bool {
        self.context_limit(provider, model) >= EXTENDED_CONTEXT_THRESHOLD
    }

    /// Built-in models listed for a provider, in table order
    pub fn known_models(provider: Provider) -> Vec<ModelCapacity> {
        BUILTIN_CAPACITIES
            .get(&provider)
            .map(|models| {
                models
                    .iter()
                    .map(|(model, total)| ModelCapacity::new(provider, *model, *total))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_model_exceeds_local_model() {
        let claude = get_model_context_limit(Provider::Anthropic, "claude-3-5-sonnet");
        let llama = get_model_context_limit(Provider::Ollama, "llama3");
        assert_eq!(claude, 200_000);
        assert_eq!(llama, 8_192);
        assert!(claude > llama);
    }

    #[test]
    fn test_model_lookup_is_case_insensitive() {
        assert_eq!(get_model_context_limit(Provider::OpenAi, "GPT-4"), 8_192);
    }

    #[test]
    fn test_unknown_model_uses_provider_default() {
        let limit = get_model_context_limit(Provider::OpenAi, "gpt-9-experimental");
        assert_eq!(limit, 128_000);
        assert!(limit > 0);
    }

    #[test]
    fn test_unknown_provider_uses_global_default() {
        assert_eq!(
            get_model_context_limit(Provider::Unknown, "anything"),
            GLOBAL_DEFAULT_CONTEXT
        );
    }

    #[test]
    fn test_safe_input_limit() {
        let total = get_model_context_limit(Provider::Anthropic, "claude-3-opus");
        let default_safe = get_safe_input_limit(Provider::Anthropic, "claude-3-opus", None);
        assert!(default_safe < total);
        assert_eq!(default_safe, total - MAX_RESPONSE_RESERVE);

        let small_reserve = get_safe_input_limit(Provider::Anthropic, "claude-3-opus", Some(2_000));
        let large_reserve = get_safe_input_limit(Provider::Anthropic, "claude-3-opus", Some(8_000));
        assert!(small_reserve > large_reserve);
    }

    #[test]
    fn test_default_reserve_on_small_windows() {
        assert_eq!(default_response_reserve(4_096), 512);
        assert_eq!(default_response_reserve(16_385), 1_638);
        assert_eq!(default_response_reserve(200_000), MAX_RESPONSE_RESERVE);
        assert_eq!(default_response_reserve(600), 300);

        let safe = get_safe_input_limit(Provider::Ollama, "phi3", None);
        assert!(safe > 0 && safe < 4_096);
    }

    #[test]
    fn test_extended_context() {
        assert!(has_extended_context(Provider::Google, "gemini-1.5-pro"));
        assert!(has_extended_context(Provider::Anthropic, "claude-sonnet-4"));
        assert!(!has_extended_context(Provider::Ollama, "llama3"));
        assert!(!has_extended_context(Provider::LmStudio, "whatever"));
        assert!(!has_extended_context(Provider::Unknown, "mystery"));
    }

    #[test]
    fn test_registry_overrides_win() {
        let registry = ModelRegistry::new()
            .with_model(Provider::Ollama, "llama3", 32_768)
            .with_provider_default(Provider::LmStudio, 16_384);

        assert_eq!(registry.context_limit(Provider::Ollama, "llama3"), 32_768);
        assert_eq!(registry.context_limit(Provider::LmStudio, "custom"), 16_384);
        // Built-ins are untouched elsewhere
        assert_eq!(registry.context_limit(Provider::Ollama, "phi3"), 4_096);
        assert_eq!(registry.override_count(), 2);
    }

    #[test]
    fn test_registry_capacity_flags_extended() {
        let registry = ModelRegistry::new();
        let capacity = registry.capacity(Provider::OpenAi, "gpt-4o");
        assert_eq!(capacity.total_tokens, 128_000);
        assert!(capacity.extended);
        assert!(!registry.capacity(Provider::OpenAi, "gpt-4").extended);
    }

    #[test]
    fn test_known_models() {
        let models = ModelRegistry::known_models(Provider::DeepSeek);
        assert_eq!(models.len(), 2);
        assert!(models.iter().all(|m| m.provider == Provider::DeepSeek));
    }
}
