//! Configuration loading
//!
//! Settings come from an optional file (TOML, YAML or JSON, chosen by
//! extension) layered under `CONTEXT_BUDGET__`-prefixed environment variables,
//! e.g. `CONTEXT_BUDGET__MONITOR__WARNING_PERCENT=75`.

use crate::context::token_budget::MIN_CONTEXT_TOKENS;
use crate::context::{
    AllocationPolicy, BudgetError, ContextAssembler, ContextBudgetManager, ModelRegistry,
    MonitorConfig, Provider, UsageMonitor,
};
use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "CONTEXT_BUDGET";

/// Environment variable naming a config file for [`Config::load`]
pub const CONFIG_PATH_ENV: &str = "CONTEXT_BUDGET_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub allocation: AllocationPolicy,

    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Per-model capacity overrides
    #[serde(default)]
    pub models: Vec<ModelOverride>,

    /// Per-provider fallback capacities
    #[serde(default)]
    pub provider_defaults: Vec<ProviderDefault>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Capacity override for one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOverride {
    pub provider: Provider,
    pub model: String,
    pub total_tokens: usize,
}

/// Fallback capacity for unlisted models of a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDefault {
    pub provider: Provider,
    pub total_tokens: usize,
}

impl Config {
    /// Load from a config file, with environment overrides applied on top
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        Self::build(Some(path))
    }

    /// Load from `.env`, the file named by `CONTEXT_BUDGET_CONFIG` if set,
    /// and the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::build(None)?,
        };

        info!(
            "Configuration loaded: {} model overrides, {} provider defaults",
            config.models.len(),
            config.provider_defaults.len()
        );
        Ok(config)
    }

    fn build(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let config: Self = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the allocation policy, monitor thresholds and capacities
    pub fn validate(&self) -> Result<()> {
        self.allocation.validate()?;

        if !self.monitor.is_valid() {
            return Err(ContextError::Configuration(format!(
                "Monitor thresholds invalid: warning {}%, critical {}%, summarize ratio {}",
                self.monitor.warning_percent,
                self.monitor.critical_percent,
                self.monitor.summarize_token_ratio
            )));
        }

        let capacities = self
            .models
            .iter()
            .map(|m| m.total_tokens)
            .chain(self.provider_defaults.iter().map(|p| p.total_tokens));
        for total in capacities {
            if total < MIN_CONTEXT_TOKENS {
                return Err(BudgetError::CapacityTooSmall {
                    total,
                    min: MIN_CONTEXT_TOKENS,
                }
                .into());
            }
        }

        if let Some(empty) = self.models.iter().find(|m| m.model.trim().is_empty()) {
            return Err(ContextError::Configuration(format!(
                "Model override for {} has an empty model name",
                empty.provider
            )));
        }

        Ok(())
    }

    /// Model registry with this configuration's overrides
    pub fn registry(&self) -> ModelRegistry {
        let registry = self
            .models
            .iter()
            .fold(ModelRegistry::new(), |registry, m| {
                registry.with_model(m.provider, &m.model, m.total_tokens)
            });
        self.provider_defaults
            .iter()
            .fold(registry, |registry, p| {
                registry.with_provider_default(p.provider, p.total_tokens)
            })
    }

    pub fn budget_manager(&self) -> Result<ContextBudgetManager> {
        Ok(ContextBudgetManager::new(self.allocation.clone(), self.registry())?)
    }

    pub fn usage_monitor(&self) -> UsageMonitor {
        UsageMonitor::new(self.monitor.clone())
    }

    /// Assembler wired with this configuration
    pub fn assembler(&self) -> Result<ContextAssembler> {
        self.validate()?;
        Ok(ContextAssembler::new(self.budget_manager()?, self.usage_monitor()))
    }
}
