//! Recent-message selection under a token budget

use super::models::ChatMessage;
use super::provider::Provider;
use super::token_estimator::count_message_tokens;

/// Fewest messages worth fetching for a request
pub const MIN_RECENT_MESSAGES: usize = 4;

/// Most messages worth fetching for a request
pub const MAX_RECENT_MESSAGES: usize = 100;

/// Longest suffix of a conversation that fits a budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSelection<'a> {
    /// Selected messages, oldest first
    pub messages: &'a [ChatMessage],
    /// True when older messages were dropped
    pub truncated: bool,
    /// Sum of per-message token estimates for the selection
    pub token_count: usize,
}

impl MessageSelection<'_> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// How many recent messages to fetch for a budget, clamped to [4, 100].
pub fn calculate_recent_message_count(
    budget_tokens: usize,
    avg_tokens_per_message: usize,
) -> usize {
    if avg_tokens_per_message == 0 {
        return MAX_RECENT_MESSAGES;
    }
    (budget_tokens / avg_tokens_per_message).clamp(MIN_RECENT_MESSAGES, MAX_RECENT_MESSAGES)
}

/// Select the most recent messages whose combined estimate fits `budget_tokens`.
///
/// Walks from the newest message backwards and stops at the first message that
/// would overflow the budget. The newest message is always kept, even when it
/// alone exceeds the budget.
pub fn select_recent_messages(
    messages: &[ChatMessage],
    budget_tokens: usize,
    provider: Provider,
) -> MessageSelection<'_> {
    let mut start = messages.len();
    let mut used = 0;

    for (index, message) in messages.iter().enumerate().rev() {
        let cost = count_message_tokens(message, provider);
        let is_newest = index + 1 == messages.len();
        if !is_newest && used + cost > budget_tokens {
            break;
        }
        used += cost;
        start = index;
    }

    MessageSelection {
        messages: &messages[start..],
        truncated: start > 0,
        token_count: used,
    }
}
