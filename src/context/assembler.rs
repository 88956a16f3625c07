//! Per-request context assembly
//!
//! Ties the budget, prompt builder, formatters, selector and monitor together
//! for one (provider, model):
//! - Budget lookup through a shared cache
//! - Memories and summary rendered into their category budgets
//! - Recent messages selected into their budget plus any slack left unused
//!   by memories and summary
//! - Usage status against the safe input limit

use super::budget_cache::BudgetCache;
use super::formatters::{
    format_memories_for_context, format_summary_for_context, FormattedMemories, FormattedSummary,
};
use super::message_selector::select_recent_messages;
use super::models::{ChatMessage, ScoredMemory};
use super::provider::Provider;
use super::system_prompt::{build_system_prompt, Character, Persona, PromptOverrides};
use super::token_budget::{ContextBudget, ContextBudgetManager};
use super::token_estimator::{
    count_messages_tokens, estimate_tokens, CONVERSATION_OVERHEAD_TOKENS,
};
use super::usage_monitor::{ContextStatus, UsageMonitor, WarningLevel};
use crate::metrics::METRICS;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Inputs for one request
#[derive(Debug, Clone)]
pub struct AssemblyRequest<'a> {
    pub provider: Provider,
    pub model: &'a str,
    pub character: &'a Character,
    pub persona: Option<&'a Persona>,
    pub overrides: PromptOverrides,
    pub summary: Option<&'a str>,
    pub memories: &'a [ScoredMemory],
    /// Full conversation history, oldest first
    pub messages: &'a [ChatMessage],
}

impl<'a> AssemblyRequest<'a> {
    pub fn new(provider: Provider, model: &'a str, character: &'a Character) -> Self {
        Self {
            provider,
            model,
            character,
            persona: None,
            overrides: PromptOverrides::default(),
            summary: None,
            memories: &[],
            messages: &[],
        }
    }

    pub fn with_persona(mut self, persona: &'a Persona) -> Self {
        self.persona = Some(persona);
        self
    }

    pub fn with_overrides(mut self, overrides: PromptOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_summary(mut self, summary: &'a str) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_memories(mut self, memories: &'a [ScoredMemory]) -> Self {
        self.memories = memories;
        self
    }

    pub fn with_messages(mut self, messages: &'a [ChatMessage]) -> Self {
        self.messages = messages;
        self
    }
}

/// Estimated tokens per category for an assembled request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub system_prompt: usize,
    pub memories: usize,
    pub summary: usize,
    pub messages: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.system_prompt + self.memories + self.summary + self.messages
    }
}

/// Context ready to hand to a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub system_prompt: String,
    pub memories: FormattedMemories,
    pub summary: FormattedSummary,
    /// Selected recent messages, oldest first
    pub messages: Vec<ChatMessage>,
    pub messages_dropped: usize,
    pub budget: ContextBudget,
    pub usage: TokenUsage,
    pub status: ContextStatus,
    pub should_summarize: bool,
}

impl AssembledContext {
    /// System prompt followed by the memory and summary blocks that are present
    pub fn system_text(&self) -> String {
        [
            self.system_prompt.as_str(),
            self.memories.content.as_str(),
            self.summary.content.as_str(),
        ]
        .into_iter()
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
    }

    /// Provider message list: one system message, then the selected history
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(ChatMessage::system(self.system_text()));
        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// Check if the input fits the safe input limit
    pub fn is_within_budget(&self) -> bool {
        self.usage.total() <= self.budget.input_limit()
    }
}

/// Context assembler
#[derive(Debug, Default)]
pub struct ContextAssembler {
    manager: ContextBudgetManager,
    monitor: UsageMonitor,
    cache: BudgetCache,
}

impl ContextAssembler {
    pub fn new(manager: ContextBudgetManager, monitor: UsageMonitor) -> Self {
        Self {
            manager,
            monitor,
            cache: BudgetCache::new(),
        }
    }

    /// Cached budget for a model
    pub fn budget(&self, provider: Provider, model: &str) -> ContextBudget {
        self.cache.get_or_compute(&self.manager, provider, model)
    }

    /// Assemble the context for one request
    pub fn assemble(&self, request: &AssemblyRequest<'_>) -> AssembledContext {
        let provider = request.provider;
        let budget = self.budget(provider, request.model);

        let system_prompt =
            build_system_prompt(request.character, request.persona, &request.overrides);
        let system_tokens = estimate_tokens(&system_prompt, provider);
        if system_tokens > budget.system_prompt_budget {
            warn!(
                "System prompt for {} exceeds its budget: {} > {}",
                request.character.name, system_tokens, budget.system_prompt_budget
            );
        }

        let memories =
            format_memories_for_context(request.memories, budget.memory_budget, provider);
        if memories.truncated {
            METRICS.record_truncation("memories");
        }
        let summary = request
            .summary
            .map(|s| format_summary_for_context(s, budget.summary_budget, provider))
            .unwrap_or_default();
        if summary.is_truncated() {
            METRICS.record_truncation("summary");
        }

        // Unused memory and summary allowance goes to the conversation
        let slack = budget.memory_budget.saturating_sub(memories.token_count)
            + budget.summary_budget.saturating_sub(summary.token_count);
        let message_allowance = budget
            .recent_messages_budget
            .saturating_add(slack)
            .saturating_sub(CONVERSATION_OVERHEAD_TOKENS);
        let selection = select_recent_messages(request.messages, message_allowance, provider);
        let messages_dropped = request.messages.len() - selection.len();
        let message_tokens = if selection.is_empty() {
            0
        } else {
            selection.token_count + CONVERSATION_OVERHEAD_TOKENS
        };

        let usage = TokenUsage {
            system_prompt: system_tokens,
            memories: memories.token_count,
            summary: summary.token_count,
            messages: message_tokens,
        };
        let safe_limit = budget.input_limit();
        let status = self.monitor.status(usage.total(), safe_limit);
        let should_summarize = self.monitor.should_summarize(
            request.messages.len(),
            count_messages_tokens(request.messages, provider),
            budget.total_limit,
        );

        debug!(
            "Assembled context for {}/{}: system={}, memories={} ({} used), summary={}, messages={} ({} kept, {} dropped), total={}, safe_limit={}",
            provider,
            request.model,
            usage.system_prompt,
            usage.memories,
            memories.memories_used,
            usage.summary,
            usage.messages,
            selection.len(),
            messages_dropped,
            usage.total(),
            safe_limit
        );

        if status.level != WarningLevel::Ok {
            warn!(
                "Context usage {} for {}/{}: {}",
                status.level.as_str(),
                provider,
                request.model,
                status.message
            );
        }

        METRICS.record_assembly(
            provider.as_str(),
            status.percent_used,
            status.level.as_str(),
            usage.total() > safe_limit,
        );
        METRICS.record_selection(messages_dropped, memories.memories_used);
        if should_summarize {
            METRICS.record_summarization();
        }

        AssembledContext {
            system_prompt,
            memories,
            summary,
            messages: selection.messages.to_vec(),
            messages_dropped,
            budget,
            usage,
            status,
            should_summarize,
        }
    }

    pub fn manager(&self) -> &ContextBudgetManager {
        &self.manager
    }

    pub fn monitor(&self) -> &UsageMonitor {
        &self.monitor
    }

    pub fn cache(&self) -> &BudgetCache {
        &self.cache
    }
}
