//! Context usage classification and overflow prediction

use super::model_registry::get_safe_input_limit;
use super::models::ChatMessage;
use super::provider::Provider;
use super::token_estimator::{count_messages_tokens, estimate_tokens, format_token_count};
use serde::{Deserialize, Serialize};

/// Usage percentage at which the level becomes `Warning`
pub const WARNING_THRESHOLD_PERCENT: u8 = 80;

/// Usage percentage at which the level becomes `Critical`
pub const CRITICAL_THRESHOLD_PERCENT: u8 = 95;

/// Conversations longer than this should be summarized
pub const SUMMARIZE_MESSAGE_THRESHOLD: usize = 50;

/// Fraction of the window past which a conversation should be summarized
pub const SUMMARIZE_TOKEN_RATIO: f64 = 0.7;

/// How close usage is to the context limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Ok,
    Warning,
    Critical,
}

impl WarningLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::Ok => "ok",
            WarningLevel::Warning => "warning",
            WarningLevel::Critical => "critical",
        }
    }
}

/// Usage snapshot for the user-facing layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStatus {
    pub level: WarningLevel,
    pub percent_used: u8,
    pub message: String,
}

/// Result of checking a prospective request against the safe input limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceedCheck {
    pub will_exceed: bool,
    pub percent_used: u8,
    pub estimated_tokens: usize,
    pub safe_limit: usize,
}

/// Threshold configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_warning_percent")]
    pub warning_percent: u8,

    #[serde(default = "default_critical_percent")]
    pub critical_percent: u8,

    #[serde(default = "default_summarize_message_threshold")]
    pub summarize_message_threshold: usize,

    #[serde(default = "default_summarize_token_ratio")]
    pub summarize_token_ratio: f64,
}

fn default_warning_percent() -> u8 {
    WARNING_THRESHOLD_PERCENT
}

fn default_critical_percent() -> u8 {
    CRITICAL_THRESHOLD_PERCENT
}

fn default_summarize_message_threshold() -> usize {
    SUMMARIZE_MESSAGE_THRESHOLD
}

fn default_summarize_token_ratio() -> f64 {
    SUMMARIZE_TOKEN_RATIO
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            warning_percent: default_warning_percent(),
            critical_percent: default_critical_percent(),
            summarize_message_threshold: default_summarize_message_threshold(),
            summarize_token_ratio: default_summarize_token_ratio(),
        }
    }
}

impl MonitorConfig {
    /// Check that thresholds are ordered and within range
    pub fn is_valid(&self) -> bool {
        self.warning_percent < self.critical_percent
            && self.critical_percent <= 100
            && self.summarize_token_ratio > 0.0
            && self.summarize_token_ratio <= 1.0
    }
}

/// Usage monitor with configurable thresholds
#[derive(Debug, Clone, Default)]
pub struct UsageMonitor {
    config: MonitorConfig,
}

impl UsageMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn warning_level(&self, used: usize, total: usize) -> WarningLevel {
        self.level_for_percent(get_context_usage_percent(used, total))
    }

    fn level_for_percent(&self, percent: u8) -> WarningLevel {
        if percent >= self.config.critical_percent {
            WarningLevel::Critical
        } else if percent >= self.config.warning_percent {
            WarningLevel::Warning
        } else {
            WarningLevel::Ok
        }
    }

    pub fn status(&self, used: usize, total: usize) -> ContextStatus {
        let percent_used = get_context_usage_percent(used, total);
        let level = self.level_for_percent(percent_used);
        let message = match level {
            WarningLevel::Ok => format!(
                "Context usage is healthy: {} of {} tokens ({}%).",
                format_token_count(used),
                format_token_count(total),
                percent_used
            ),
            WarningLevel::Warning => format!(
                "Context is filling up: {}% used. Older messages will soon be dropped or summarized.",
                percent_used
            ),
            WarningLevel::Critical => format!(
                "Context is nearly full: {}% used. Summarize the conversation or start a new chat.",
                percent_used
            ),
        };
        ContextStatus {
            level,
            percent_used,
            message,
        }
    }

    pub fn should_summarize(
        &self,
        message_count: usize,
        estimated_tokens: usize,
        total_limit: usize,
    ) -> bool {
        message_count > self.config.summarize_message_threshold
            || estimated_tokens as f64 > total_limit as f64 * self.config.summarize_token_ratio
    }
}

/// Percentage of `limit` consumed by `used`, rounded and capped at 100.
/// A zero limit reports 100 (exhausted).
pub fn get_context_usage_percent(used: usize, limit: usize) -> u8 {
    if limit == 0 {
        return 100;
    }
    let percent = (used as f64 / limit as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

pub fn get_context_warning_level(used: usize, total: usize) -> WarningLevel {
    UsageMonitor::default().warning_level(used, total)
}

pub fn get_context_status(used: usize, total: usize) -> ContextStatus {
    UsageMonitor::default().status(used, total)
}

/// Predict whether sending `candidate_text` after `messages` would overflow
/// the model's safe input limit.
pub fn will_exceed_context_limit(
    messages: &[ChatMessage],
    candidate_text: &str,
    provider: Provider,
    model: &str,
) -> ExceedCheck {
    let estimated_tokens =
        count_messages_tokens(messages, provider) + estimate_tokens(candidate_text, provider);
    let safe_limit = get_safe_input_limit(provider, model, None);
    ExceedCheck {
        will_exceed: estimated_tokens > safe_limit,
        percent_used: get_context_usage_percent(estimated_tokens, safe_limit),
        estimated_tokens,
        safe_limit,
    }
}

/// Whether a conversation is long enough, by count or by tokens, to summarize
pub fn should_summarize_conversation(
    message_count: usize,
    estimated_tokens: usize,
    total_limit: usize,
) -> bool {
    UsageMonitor::default().should_summarize(message_count, estimated_tokens, total_limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_percent() {
        assert_eq!(get_context_usage_percent(50_000, 100_000), 50);
        assert_eq!(get_context_usage_percent(100, 0), 100);
        assert_eq!(get_context_usage_percent(0, 0), 100);
        assert_eq!(get_context_usage_percent(150_000, 100_000), 100);
        assert_eq!(get_context_usage_percent(0, 100_000), 0);
        // 2/3 rounds to 67
        assert_eq!(get_context_usage_percent(2, 3), 67);
    }

    #[test]
    fn test_warning_level_boundaries() {
        assert_eq!(get_context_warning_level(50, 100), WarningLevel::Ok);
        assert_eq!(get_context_warning_level(79, 100), WarningLevel::Ok);
        assert_eq!(get_context_warning_level(80, 100), WarningLevel::Warning);
        assert_eq!(get_context_warning_level(85, 100), WarningLevel::Warning);
        assert_eq!(get_context_warning_level(94, 100), WarningLevel::Warning);
        assert_eq!(get_context_warning_level(95, 100), WarningLevel::Critical);
        assert_eq!(get_context_warning_level(96, 100), WarningLevel::Critical);
    }

    #[test]
    fn test_status_matches_level() {
        for used in [50, 85, 96] {
            let status = get_context_status(used, 100);
            assert_eq!(status.level, get_context_warning_level(used, 100));
            assert!(!status.message.is_empty());
        }
        assert_ne!(get_context_status(50, 100).message, get_context_status(96, 100).message);
    }

    #[test]
    fn test_will_exceed_context_limit() {
        let messages = vec![
            ChatMessage::user("Hello"),
            ChatMessage::assistant("Greetings, traveller."),
        ];
        let check = will_exceed_context_limit(
            &messages,
            "How far to the city?",
            Provider::Anthropic,
            "claude-3-opus",
        );
        assert!(!check.will_exceed);
        assert_eq!(check.safe_limit, 200_000 - 8_192);
        assert_eq!(check.percent_used, 0);

        let huge = "word ".repeat(20_000);
        let check = will_exceed_context_limit(&messages, &huge, Provider::Ollama, "llama2");
        assert!(check.will_exceed);
        assert_eq!(check.percent_used, 100);
        assert!(check.estimated_tokens > check.safe_limit);
    }

    #[test]
    fn test_should_summarize_conversation() {
        assert!(!should_summarize_conversation(10, 5_000, 200_000));
        assert!(should_summarize_conversation(100, 150_000, 200_000));
        assert!(should_summarize_conversation(60, 10_000, 200_000));
        assert!(should_summarize_conversation(5, 150_000, 200_000));
        assert!(!should_summarize_conversation(50, 130_000, 200_000));
    }

    #[test]
    fn test_custom_thresholds() {
        let monitor = UsageMonitor::new(MonitorConfig {
            warning_percent: 60,
            critical_percent: 90,
            ..MonitorConfig::default()
        });
        assert!(monitor.config().is_valid());
        assert_eq!(monitor.warning_level(65, 100), WarningLevel::Warning);
        assert_eq!(monitor.warning_level(91, 100), WarningLevel::Critical);
    }

    #[test]
    fn test_invalid_monitor_config() {
        let config = MonitorConfig {
            warning_percent: 95,
            critical_percent: 80,
            ..MonitorConfig::default()
        };
        assert!(!config.is_valid());
    }
}
