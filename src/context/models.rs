//! Data models for context assembly

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One turn of conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// A persisted memory ranked by an external retrieval step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    /// Full memory text
    pub content: String,
    /// Condensed form, preferred over `content` when present
    #[serde(default)]
    pub summary: String,
    /// Importance (0.0-1.0)
    pub importance: f32,
    /// Relevance score from retrieval; higher ranks first
    pub score: f32,
}

impl ScoredMemory {
    pub fn new(content: impl Into<String>, importance: f32, score: f32) -> Self {
        Self {
            content: content.into(),
            summary: String::new(),
            importance: importance.clamp(0.0, 1.0),
            score,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Text to place in context: the summary if non-empty, else the content.
    /// Returns `None` when both are blank.
    pub fn context_text(&self) -> Option<&str> {
        let summary = self.summary.trim();
        if !summary.is_empty() {
            return Some(summary);
        }
        let content = self.content.trim();
        (!content.is_empty()).then_some(content)
    }

    /// Ranking order: score descending, then importance descending
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.importance.total_cmp(&self.importance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_text_prefers_summary() {
        let memory = ScoredMemory::new("The user grew up by the sea and misses it.", 0.6, 0.9)
            .with_summary("User misses the sea");
        assert_eq!(memory.context_text(), Some("User misses the sea"));
    }

    #[test]
    fn test_context_text_falls_back_to_content() {
        let memory = ScoredMemory::new("  Likes tea  ", 0.2, 0.1).with_summary("   ");
        assert_eq!(memory.context_text(), Some("Likes tea"));

        let blank = ScoredMemory::new("", 0.2, 0.1);
        assert_eq!(blank.context_text(), None);
    }

    #[test]
    fn test_importance_is_clamped() {
        assert_eq!(ScoredMemory::new("x", 3.0, 0.5).importance, 1.0);
        assert_eq!(ScoredMemory::new("x", -1.0, 0.5).importance, 0.0);
    }

    #[test]
    fn test_rank_cmp() {
        let high = ScoredMemory::new("a", 0.1, 0.9);
        let low = ScoredMemory::new("b", 0.9, 0.2);
        let tied_important = ScoredMemory::new("c", 0.8, 0.9);

        assert_eq!(high.rank_cmp(&low), Ordering::Less);
        assert_eq!(tied_important.rank_cmp(&high), Ordering::Less);
    }
}
