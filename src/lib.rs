//! Context window budgeting for roleplay chat
//!
//! Estimates token usage, allocates each model's context window across the
//! system prompt, memories, summary and recent messages, and assembles
//! requests that stay inside those budgets.

pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod observability;

pub use error::{ContextError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::config::{Config, LoggingConfig};
    pub use crate::context::{
        AssembledContext, AssemblyRequest, ChatMessage, Character, ContextAssembler, ContextBudget,
        ContextBudgetManager, ContextStatus, ModelRegistry, Persona, PromptOverrides, Provider,
        ScoredMemory, WarningLevel,
    };
    pub use crate::error::{ContextError, Result};
}
