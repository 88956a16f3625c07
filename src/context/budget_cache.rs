//! Memoized budgets per (provider, model)

use super::provider::Provider;
use super::token_budget::{ContextBudget, ContextBudgetManager};
use dashmap::DashMap;

/// Concurrent cache of computed budgets.
///
/// Allocation is a pure function of (provider, model), so entries never go
/// stale for the lifetime of the manager that produced them.
#[derive(Debug, Default)]
pub struct BudgetCache {
    entries: DashMap<(Provider, String), ContextBudget>,
}

impl BudgetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached budget, computing it with `manager` on first use
    pub fn get_or_compute(
        &self,
        manager: &ContextBudgetManager,
        provider: Provider,
        model: &str,
    ) -> ContextBudget {
        let key = (provider, model.trim().to_ascii_lowercase());
        if let Some(budget) = self.entries.get(&key) {
            return *budget;
        }
        *self
            .entries
            .entry(key)
            .or_insert_with(|| manager.budget(provider, model))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_repeated_lookup_hits_cache() {
        let cache = BudgetCache::new();
        let manager = ContextBudgetManager::default();

        let first = cache.get_or_compute(&manager, Provider::Anthropic, "claude-3-opus");
        let second = cache.get_or_compute(&manager, Provider::Anthropic, "Claude-3-Opus");
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);

        cache.get_or_compute(&manager, Provider::Ollama, "llama3");
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(BudgetCache::new());
        let manager = Arc::new(ContextBudgetManager::default());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    cache.get_or_compute(&manager, Provider::Google, "gemini-1.5-pro")
                })
            })
            .collect();

        let budgets: Vec<ContextBudget> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(budgets.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.len(), 1);
    }
}
