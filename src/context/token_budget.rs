//! Token budget allocation
//!
//! Splits a model's context window into per-category budgets:
//! - Response reserve: 10% of the window, clamped to 512-8,192 tokens
//! - System prompt: 10%
//! - Conversation summary: 10%
//! - Memories: 15%, scaled down on small windows (floor-and-scale rule)
//! - Recent messages: whatever is left
//!
//! The memory share is multiplied by `sqrt(min(1, total / 32_000))` and then
//! raised to a floor of `min(256, total / 8)`. A 4k local model gets a few
//! hundred memory tokens instead of a share that would crowd out the chat.

use super::model_registry::{
    ModelRegistry, MAX_RESPONSE_RESERVE, MIN_RESPONSE_RESERVE, RESPONSE_RESERVE_RATIO,
};
use super::provider::Provider;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Smallest window the allocator accepts from configuration
pub const MIN_CONTEXT_TOKENS: usize = 1_024;

/// Share of the window that must be left for recent messages
pub const MIN_RECENT_MESSAGES_SHARE: f64 = 0.10;

/// Allocation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    #[serde(default = "default_system_prompt_share")]
    pub system_prompt_share: f64,

    #[serde(default = "default_summary_share")]
    pub summary_share: f64,

    /// Memory share at full scale
    #[serde(default = "default_memory_share")]
    pub memory_share: f64,

    /// Minimum memory allowance, capped at an eighth of the window
    #[serde(default = "default_memory_floor")]
    pub memory_floor: usize,

    /// Window size at which the memory share stops being scaled down
    #[serde(default = "default_memory_full_scale_tokens")]
    pub memory_full_scale_tokens: usize,

    #[serde(default = "default_response_reserve_ratio")]
    pub response_reserve_ratio: f64,

    #[serde(default = "default_min_response_reserve")]
    pub min_response_reserve: usize,

    #[serde(default = "default_max_response_reserve")]
    pub max_response_reserve: usize,
}

fn default_system_prompt_share() -> f64 {
    0.10
}

fn default_summary_share() -> f64 {
    0.10
}

fn default_memory_share() -> f64 {
    0.15
}

fn default_memory_floor() -> usize {
    256
}

fn default_memory_full_scale_tokens() -> usize {
    32_000
}

fn default_response_reserve_ratio() -> f64 {
    RESPONSE_RESERVE_RATIO
}

fn default_min_response_reserve() -> usize {
    MIN_RESPONSE_RESERVE
}

fn default_max_response_reserve() -> usize {
    MAX_RESPONSE_RESERVE
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            system_prompt_share: default_system_prompt_share(),
            summary_share: default_summary_share(),
            memory_share: default_memory_share(),
            memory_floor: default_memory_floor(),
            memory_full_scale_tokens: default_memory_full_scale_tokens(),
            response_reserve_ratio: default_response_reserve_ratio(),
            min_response_reserve: default_min_response_reserve(),
            max_response_reserve: default_max_response_reserve(),
        }
    }
}

impl AllocationPolicy {
    /// Validate that the policy leaves room for recent messages
    pub fn validate(&self) -> Result<(), BudgetError> {
        let shares = [
            ("system_prompt_share", self.system_prompt_share),
            ("summary_share", self.summary_share),
            ("memory_share", self.memory_share),
            ("response_reserve_ratio", self.response_reserve_ratio),
        ];
        for (name, value) in shares {
            if !(value > 0.0 && value < 1.0) {
                return Err(BudgetError::InvalidShare { name, value });
            }
        }

        if self.min_response_reserve == 0 || self.min_response_reserve > self.max_response_reserve {
            return Err(BudgetError::InvalidReserve {
                min: self.min_response_reserve,
                max: self.max_response_reserve,
            });
        }

        if self.memory_full_scale_tokens == 0 {
            return Err(BudgetError::InvalidShare {
                name: "memory_full_scale_tokens",
                value: 0.0,
            });
        }

        let total: f64 = shares.iter().map(|(_, v)| v).sum();
        if total > 1.0 - MIN_RECENT_MESSAGES_SHARE {
            return Err(BudgetError::ConfigurationInvalid {
                allocated: (total * 100.0).round() as usize,
                max: ((1.0 - MIN_RECENT_MESSAGES_SHARE) * 100.0).round() as usize,
            });
        }

        Ok(())
    }

    /// Response reserve for a window of `total_tokens`
    pub fn response_reserve(&self, total_tokens: usize) -> usize {
        let proportional = (total_tokens as f64 * self.response_reserve_ratio) as usize;
        proportional
            .clamp(self.min_response_reserve, self.max_response_reserve)
            .min(total_tokens / 2)
    }

    /// Memory budget under the floor-and-scale rule
    pub fn memory_budget(&self, total_tokens: usize) -> usize {
        let scale = (total_tokens as f64 / self.memory_full_scale_tokens as f64)
            .min(1.0)
            .sqrt();
        let scaled = (total_tokens as f64 * self.memory_share * scale) as usize;
        scaled.max(self.memory_floor.min(total_tokens / 8))
    }

    /// Split a window of `total_tokens` into category budgets
    pub fn allocate(&self, total_tokens: usize) -> ContextAllocation {
        let response_reserve = self.response_reserve(total_tokens);
        let system_prompt = (total_tokens as f64 * self.system_prompt_share) as usize;
        let summary = (total_tokens as f64 * self.summary_share) as usize;
        let memories = self.memory_budget(total_tokens);

        let fixed = response_reserve + system_prompt + summary + memories;
        if fixed >= total_tokens {
            return Self::proportional_fallback(total_tokens);
        }

        ContextAllocation {
            total_limit: total_tokens,
            system_prompt,
            memories,
            summary,
            recent_messages: total_tokens - fixed,
            response_reserve,
        }
    }

    // Reserve and memory floors overran the window: plain fractions, no minimums
    fn proportional_fallback(total_tokens: usize) -> ContextAllocation {
        let response_reserve = total_tokens / 4;
        let system_prompt = total_tokens / 10;
        let summary = total_tokens / 10;
        let memories = total_tokens / 10;
        ContextAllocation {
            total_limit: total_tokens,
            system_prompt,
            memories,
            summary,
            recent_messages: total_tokens - response_reserve - system_prompt - summary - memories,
            response_reserve,
        }
    }
}

/// Raw allocator output for one (provider, model)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAllocation {
    pub total_limit: usize,
    pub system_prompt: usize,
    pub memories: usize,
    pub summary: usize,
    pub recent_messages: usize,
    pub response_reserve: usize,
}

impl ContextAllocation {
    pub fn total_allocated(&self) -> usize {
        self.system_prompt
            + self.memories
            + self.summary
            + self.recent_messages
            + self.response_reserve
    }
}

/// Per-request token budget handed to the request-assembly layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub total_limit: usize,
    pub system_prompt_budget: usize,
    pub memory_budget: usize,
    pub summary_budget: usize,
    pub recent_messages_budget: usize,
    pub response_reserve: usize,
}

impl ContextBudget {
    /// Sum of all category budgets
    pub fn total_allocated(&self) -> usize {
        self.system_prompt_budget
            + self.memory_budget
            + self.summary_budget
            + self.recent_messages_budget
            + self.response_reserve
    }

    /// Check if the category budgets fit within the window
    pub fn is_within_budget(&self) -> bool {
        self.total_allocated() <= self.total_limit
    }

    /// Tokens available for everything except the response
    pub fn input_limit(&self) -> usize {
        self.total_limit.saturating_sub(self.response_reserve)
    }
}

impl From<ContextAllocation> for ContextBudget {
    fn from(allocation: ContextAllocation) -> Self {
        Self {
            total_limit: allocation.total_limit,
            system_prompt_budget: allocation.system_prompt,
            memory_budget: allocation.memories,
            summary_budget: allocation.summary,
            recent_messages_budget: allocation.recent_messages,
            response_reserve: allocation.response_reserve,
        }
    }
}

/// Token budget errors
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Configuration invalid: {allocated}% of the window allocated, {max}% max")]
    ConfigurationInvalid { allocated: usize, max: usize },

    #[error("Share {name} must be between 0 and 1, got {value}")]
    InvalidShare { name: &'static str, value: f64 },

    #[error("Response reserve bounds invalid: min {min}, max {max}")]
    InvalidReserve { min: usize, max: usize },

    #[error("Context window too small: {total} tokens, need at least {min}")]
    CapacityTooSmall { total: usize, min: usize },
}

/// Recommended category split for a model, using the default policy.
pub fn get_recommended_context_allocation(provider: Provider, model: &str) -> ContextAllocation {
    let total = super::model_registry::get_model_context_limit(provider, model);
    AllocationPolicy::default().allocate(total)
}

/// Context budget for a model, using the default policy.
pub fn calculate_context_budget(provider: Provider, model: &str) -> ContextBudget {
    get_recommended_context_allocation(provider, model).into()
}

/// Budget manager combining an allocation policy with a model registry
#[derive(Debug, Clone, Default)]
pub struct ContextBudgetManager {
    policy: AllocationPolicy,
    registry: ModelRegistry,
}

impl ContextBudgetManager {
    /// Create a new budget manager, rejecting policies that starve recent messages
    pub fn new(policy: AllocationPolicy, registry: ModelRegistry) -> Result<Self, BudgetError> {
        policy.validate()?;
        Ok(Self { policy, registry })
    }

    pub fn allocation(&self, provider: Provider, model: &str) -> ContextAllocation {
        self.policy.allocate(self.registry.context_limit(provider, model))
    }

    pub fn budget(&self, provider: Provider, model: &str) -> ContextBudget {
        let budget: ContextBudget = self.allocation(provider, model).into();
        debug!(
            "Budget for {}/{}: total={}, system={}, memories={}, summary={}, recent={}, reserve={}",
            provider,
            model,
            budget.total_limit,
            budget.system_prompt_budget,
            budget.memory_budget,
            budget.summary_budget,
            budget.recent_messages_budget,
            budget.response_reserve
        );
        budget
    }

    /// Safe input limit using this manager's reserve policy
    pub fn safe_input_limit(&self, provider: Provider, model: &str) -> usize {
        let total = self.registry.context_limit(provider, model);
        self.registry
            .safe_input_limit(provider, model, Some(self.policy.response_reserve(total)))
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_positive_and_bounded(allocation: &ContextAllocation) {
        assert!(allocation.system_prompt > 0);
        assert!(allocation.memories > 0);
        assert!(allocation.summary > 0);
        assert!(allocation.recent_messages > 0);
        assert!(allocation.response_reserve > 0);
        assert!(allocation.total_allocated() <= allocation.total_limit);
    }

    #[test]
    fn test_default_policy_is_valid() {
        assert!(AllocationPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_large_model_allocation() {
        let allocation =
            get_recommended_context_allocation(Provider::Anthropic, "claude-3-5-sonnet");
        assert_eq!(allocation.total_limit, 200_000);
        assert_eq!(allocation.response_reserve, 8_192);
        assert_eq!(allocation.system_prompt, 20_000);
        assert_eq!(allocation.summary, 20_000);
        assert_eq!(allocation.memories, 30_000);
        assert_eq!(allocation.recent_messages, 200_000 - 8_192 - 70_000);
        assert_positive_and_bounded(&allocation);
    }

    #[test]
    fn test_small_model_gets_memory_floor() {
        let allocation = get_recommended_context_allocation(Provider::Ollama, "phi3");
        assert_eq!(allocation.total_limit, 4_096);
        assert_eq!(allocation.memories, 256);
        assert_eq!(allocation.response_reserve, 512);
        assert_positive_and_bounded(&allocation);
    }

    #[test]
    fn test_memory_budget_grows_with_capacity() {
        let small = get_recommended_context_allocation(Provider::Ollama, "llama3");
        let large = get_recommended_context_allocation(Provider::Anthropic, "claude-opus-4");
        assert!(large.memories > small.memories);

        // Share of the window, not just the absolute value, shrinks on small models
        let small_share = small.memories as f64 / small.total_limit as f64;
        let large_share = large.memories as f64 / large.total_limit as f64;
        assert!(small_share < large_share);
    }

    #[test]
    fn test_every_builtin_and_fallback_is_positive() {
        for provider in Provider::KNOWN.iter().copied().chain([Provider::Unknown]) {
            for capacity in ModelRegistry::known_models(provider) {
                let budget = calculate_context_budget(provider, &capacity.model);
                assert!(budget.is_within_budget());
                assert!(budget.recent_messages_budget > 0);
            }
            let fallback = get_recommended_context_allocation(provider, "no-such-model");
            assert_positive_and_bounded(&fallback);
        }
    }

    #[test]
    fn test_tiny_window_caps_reserve_at_half() {
        let allocation = AllocationPolicy::default().allocate(600);
        assert_positive_and_bounded(&allocation);
        assert_eq!(allocation.response_reserve, 300);
        assert_eq!(allocation.memories, 75);
    }

    #[test]
    fn test_floors_overrunning_window_fall_back_to_fractions() {
        let policy = AllocationPolicy {
            system_prompt_share: 0.3,
            summary_share: 0.3,
            memory_share: 0.2,
            response_reserve_ratio: 0.05,
            ..AllocationPolicy::default()
        };
        assert!(policy.validate().is_ok());

        let allocation = policy.allocate(1_500);
        assert_eq!(allocation.response_reserve, 375);
        assert_eq!(allocation.recent_messages, 675);
        assert_positive_and_bounded(&allocation);
    }

    #[test]
    fn test_budget_mirrors_allocation() {
        let allocation = get_recommended_context_allocation(Provider::OpenAi, "gpt-4o");
        let budget = calculate_context_budget(Provider::OpenAi, "gpt-4o");
        assert_eq!(budget.memory_budget, allocation.memories);
        assert_eq!(budget.recent_messages_budget, allocation.recent_messages);
        assert_eq!(budget.input_limit(), 128_000 - budget.response_reserve);
    }

    #[test]
    fn test_policy_rejects_overcommitted_shares() {
        let policy = AllocationPolicy {
            memory_share: 0.6,
            ..AllocationPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(BudgetError::ConfigurationInvalid { .. })
        ));
        assert!(ContextBudgetManager::new(policy, ModelRegistry::new()).is_err());
    }

    #[test]
    fn test_policy_rejects_bad_share_and_reserve() {
        let negative = AllocationPolicy {
            summary_share: -0.1,
            ..AllocationPolicy::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(BudgetError::InvalidShare { name: "summary_share", .. })
        ));

        let inverted = AllocationPolicy {
            min_response_reserve: 9_000,
            ..AllocationPolicy::default()
        };
        assert!(matches!(inverted.validate(), Err(BudgetError::InvalidReserve { .. })));
    }

    #[test]
    fn test_manager_uses_registry_overrides() {
        let registry = ModelRegistry::new().with_model(Provider::Ollama, "llama3", 65_536);
        let manager = ContextBudgetManager::new(AllocationPolicy::default(), registry).unwrap();

        let budget = manager.budget(Provider::Ollama, "llama3");
        assert_eq!(budget.total_limit, 65_536);
        assert_eq!(manager.safe_input_limit(Provider::Ollama, "llama3"), 65_536 - 6_553);
    }
}
