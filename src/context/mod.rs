//! Context window budgeting
//!
//! Estimates token costs, splits each model's window into category budgets,
//! and fits memories, summaries and recent messages into those budgets.

pub mod assembler;
pub mod budget_cache;
pub mod formatters;
pub mod message_selector;
pub mod model_registry;
pub mod models;
pub mod provider;
pub mod system_prompt;
pub mod token_budget;
pub mod token_estimator;
pub mod usage_monitor;

pub use assembler::{AssembledContext, AssemblyRequest, ContextAssembler, TokenUsage};
pub use budget_cache::BudgetCache;
pub use formatters::{
    format_memories_for_context, format_summary_for_context, FormattedMemories, FormattedSummary,
};
pub use message_selector::{
    calculate_recent_message_count, select_recent_messages, MessageSelection,
};
pub use model_registry::{
    get_model_context_limit, get_safe_input_limit, has_extended_context, ModelCapacity,
    ModelRegistry,
};
pub use models::{ChatMessage, ScoredMemory};
pub use provider::Provider;
pub use system_prompt::{build_system_prompt, Character, Persona, PromptOverrides};
pub use token_budget::{
    calculate_context_budget, get_recommended_context_allocation, AllocationPolicy, BudgetError,
    ContextAllocation, ContextBudget, ContextBudgetManager,
};
pub use token_estimator::{
    count_message_tokens, count_messages_tokens, estimate_tokens, format_token_count,
    truncate_to_token_limit, CharRatioEstimator, TokenEstimator,
};
pub use usage_monitor::{
    get_context_status, get_context_usage_percent, get_context_warning_level,
    should_summarize_conversation, will_exceed_context_limit, ContextStatus, ExceedCheck,
    MonitorConfig, UsageMonitor, WarningLevel,
};
