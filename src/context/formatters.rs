//! Budget-bounded rendering of memories and conversation summaries

use super::models::ScoredMemory;
use super::provider::Provider;
use super::token_estimator::{
    estimate_tokens, truncate_to_token_limit, CharRatioEstimator, TRUNCATION_MARKER,
};
use serde::{Deserialize, Serialize};

pub const MEMORY_SECTION_HEADER: &str = "[Relevant memories]";
pub const SUMMARY_SECTION_HEADER: &str = "[Conversation summary]";

const MEMORY_LINE_PREFIX: &str = "- ";

/// Memories rendered into a context block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedMemories {
    pub content: String,
    pub token_count: usize,
    pub memories_used: usize,
    /// True when the only memory included was cut to fit
    #[serde(default)]
    pub truncated: bool,
}

/// Summary rendered into a context block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedSummary {
    pub content: String,
    pub token_count: usize,
}

impl FormattedSummary {
    /// True when the body had to be cut to fit
    pub fn is_truncated(&self) -> bool {
        self.content.ends_with(TRUNCATION_MARKER)
    }
}

/// Render the highest-ranked memories that fit `budget_tokens`.
///
/// Memories are ranked by score, then importance, then input order. Each
/// memory becomes one line; the block stops before the line that would push
/// its estimate over budget. When not even the top memory fits whole, a
/// truncated form of it is used instead.
pub fn format_memories_for_context(
    memories: &[ScoredMemory],
    budget_tokens: usize,
    provider: Provider,
) -> FormattedMemories {
    let ranked: Vec<&str> = {
        let mut sorted: Vec<&ScoredMemory> = memories.iter().collect();
        // sort_by is stable, so equal ranks keep input order
        sorted.sort_by(|a, b| a.rank_cmp(b));
        sorted.into_iter().filter_map(ScoredMemory::context_text).collect()
    };
    if ranked.is_empty() || estimate_tokens(MEMORY_SECTION_HEADER, provider) > budget_tokens {
        return FormattedMemories::default();
    }

    let estimator = CharRatioEstimator::for_provider(provider);
    let mut content = String::from(MEMORY_SECTION_HEADER);
    let mut char_count = MEMORY_SECTION_HEADER.chars().count();
    let mut token_count = estimator.estimate_chars(char_count);
    let mut memories_used = 0;

    for text in &ranked {
        // newline + prefix + text
        let line_chars = 1 + MEMORY_LINE_PREFIX.chars().count() + text.chars().count();
        let candidate_tokens = estimator.estimate_chars(char_count + line_chars);
        if candidate_tokens > budget_tokens {
            break;
        }
        content.push('\n');
        content.push_str(MEMORY_LINE_PREFIX);
        content.push_str(text);
        char_count += line_chars;
        token_count = candidate_tokens;
        memories_used += 1;
    }

    if memories_used == 0 {
        return truncated_top_memory(ranked[0], budget_tokens, provider);
    }

    FormattedMemories {
        content,
        token_count,
        memories_used,
        truncated: false,
    }
}

fn truncated_top_memory(text: &str, budget_tokens: usize, provider: Provider) -> FormattedMemories {
    let prefix = format!("{}\n{}", MEMORY_SECTION_HEADER, MEMORY_LINE_PREFIX);
    let allowance = budget_tokens.saturating_sub(estimate_tokens(&prefix, provider));
    let body = truncate_to_token_limit(text, allowance, provider);

    // A bare marker carries no information
    if body.len() <= TRUNCATION_MARKER.len() {
        return FormattedMemories::default();
    }

    let content = format!("{}{}", prefix, body);
    let token_count = estimate_tokens(&content, provider);
    if token_count > budget_tokens {
        return FormattedMemories::default();
    }

    FormattedMemories {
        content,
        token_count,
        memories_used: 1,
        truncated: true,
    }
}

/// Render a conversation summary truncated to `budget_tokens`.
pub fn format_summary_for_context(
    summary: &str,
    budget_tokens: usize,
    provider: Provider,
) -> FormattedSummary {
    let summary = summary.trim();
    if summary.is_empty() {
        return FormattedSummary::default();
    }

    let prefix = format!("{}\n", SUMMARY_SECTION_HEADER);
    let allowance = budget_tokens.saturating_sub(estimate_tokens(&prefix, provider));
    if allowance == 0 {
        return FormattedSummary::default();
    }

    let body = truncate_to_token_limit(summary, allowance, provider);
    let content = format!("{}{}", prefix, body);
    let token_count = estimate_tokens(&content, provider);
    if token_count > budget_tokens {
        return FormattedSummary::default();
    }

    FormattedSummary {
        content,
        token_count,
    }
}
