//! Character-ratio token estimation
//!
//! Token counts here are a heuristic, not a tokenizer: text length divided by
//! an average characters-per-token ratio, rounded up. Google's tokenizer packs
//! slightly more text per token, so it gets a larger ratio.

use super::models::ChatMessage;
use super::provider::Provider;

/// Average characters per token for most providers
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Average characters per token for the Google model family
pub const GOOGLE_CHARS_PER_TOKEN: f64 = 3.8;

/// Tokens spent wrapping a single message (role markers, separators)
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Tokens spent framing a whole conversation
pub const CONVERSATION_OVERHEAD_TOKENS: usize = 3;

/// Marker appended to truncated text
pub const TRUNCATION_MARKER: &str = "...";

/// Token estimator trait for different estimation strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate tokens for multiple texts
    fn estimate_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.estimate(t)).collect()
    }
}

/// Estimator dividing character count by a fixed ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharRatioEstimator {
    chars_per_token: f64,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: f64) -> Self {
        Self { chars_per_token }
    }

    /// Estimator tuned for the given provider
    pub fn for_provider(provider: Provider) -> Self {
        Self::new(chars_per_token(provider))
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }

    /// Estimate for text of `char_count` characters
    pub fn estimate_chars(&self, char_count: usize) -> usize {
        (char_count as f64 / self.chars_per_token).ceil() as usize
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.estimate_chars(text.chars().count())
    }
}

/// Characters-per-token ratio for a provider
pub fn chars_per_token(provider: Provider) -> f64 {
    match provider {
        Provider::Google => GOOGLE_CHARS_PER_TOKEN,
        _ => DEFAULT_CHARS_PER_TOKEN,
    }
}

/// Estimate the token cost of `text` for `provider`.
pub fn estimate_tokens(text: &str, provider: Provider) -> usize {
    CharRatioEstimator::for_provider(provider).estimate(text)
}

/// Estimate the token cost of a single message, including its role label
/// and the per-message wrapping overhead.
pub fn count_message_tokens(message: &ChatMessage, provider: Provider) -> usize {
    estimate_tokens(&message.content, provider)
        + estimate_tokens(&message.role, provider)
        + MESSAGE_OVERHEAD_TOKENS
}

/// Estimate the token cost of a conversation. An empty conversation costs
/// nothing; otherwise the conversation framing overhead is added once.
pub fn count_messages_tokens(messages: &[ChatMessage], provider: Provider) -> usize {
    if messages.is_empty() {
        return 0;
    }
    messages
        .iter()
        .map(|m| count_message_tokens(m, provider))
        .sum::<usize>()
        + CONVERSATION_OVERHEAD_TOKENS
}

/// Render a token count for display: `500`, `1.5k`, `1.5M`.
pub fn format_token_count(tokens: usize) -> String {
    if tokens < 1_000 {
        tokens.to_string()
    } else if tokens < 1_000_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    }
}

/// Cut `text` down so its estimate fits `limit_tokens`.
///
/// Text already within the limit is returned unchanged. Otherwise the text is
/// cut on a character boundary and [`TRUNCATION_MARKER`] is appended; the
/// result is always shorter than the input. A limit too small to hold any
/// text before the marker yields an empty string.
pub fn truncate_to_token_limit(text: &str, limit_tokens: usize, provider: Provider) -> String {
    if estimate_tokens(text, provider) <= limit_tokens {
        return text.to_string();
    }

    let char_budget = (limit_tokens as f64 * chars_per_token(provider)).floor() as usize;
    let keep = char_budget.saturating_sub(TRUNCATION_MARKER.chars().count());
    if keep == 0 {
        return String::new();
    }

    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
