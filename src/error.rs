//! Crate-level error type

use crate::context::BudgetError;
use thiserror::Error;

/// Errors raised while configuring the context budget manager.
///
/// Context operations themselves never fail; they degrade to documented
/// fallbacks. Only construction and configuration loading can error.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ContextError>;
