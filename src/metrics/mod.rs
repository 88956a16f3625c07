//! Metrics collection for context budgeting

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Encoder, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Allocation metrics
    pub context_assemblies: CounterVec,
    pub context_usage_percent: Histogram,
    pub context_warning_levels: CounterVec,
    pub context_overflows: Counter,

    // Content selection metrics
    pub messages_dropped: Counter,
    pub memories_included: Counter,
    pub truncated_blocks: CounterVec,
    pub summarization_recommendations: Counter,
}

impl Metrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let context_assemblies = register_counter_vec_with_registry!(
            Opts::new("context_assemblies_total", "Total context assemblies"),
            &["provider"],
            registry
        )?;

        let context_usage_percent = register_histogram_with_registry!(
            "context_usage_percent",
            "Share of the safe input limit used per request",
            vec![10.0, 25.0, 50.0, 70.0, 80.0, 90.0, 95.0, 100.0],
            registry
        )?;

        let context_warning_levels = register_counter_vec_with_registry!(
            Opts::new("context_warning_levels_total", "Requests by usage warning level"),
            &["level"],
            registry
        )?;

        let context_overflows = register_counter_with_registry!(
            Opts::new("context_overflows_total", "Requests estimated above the safe input limit"),
            registry
        )?;

        let messages_dropped = register_counter_with_registry!(
            Opts::new("context_messages_dropped_total", "Older messages left out of context"),
            registry
        )?;

        let memories_included = register_counter_with_registry!(
            Opts::new("context_memories_included_total", "Memories placed into context"),
            registry
        )?;

        let truncated_blocks = register_counter_vec_with_registry!(
            Opts::new("context_truncated_blocks_total", "Content blocks cut to fit their budget"),
            &["block"],
            registry
        )?;

        let summarization_recommendations = register_counter_with_registry!(
            Opts::new(
                "context_summarization_recommendations_total",
                "Requests after which summarization was recommended"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            context_assemblies,
            context_usage_percent,
            context_warning_levels,
            context_overflows,
            messages_dropped,
            memories_included,
            truncated_blocks,
            summarization_recommendations,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one assembled request
    pub fn record_assembly(&self, provider: &str, percent_used: u8, level: &str, overflow: bool) {
        self.context_assemblies.with_label_values(&[provider]).inc();
        self.context_usage_percent.observe(percent_used as f64);
        self.context_warning_levels.with_label_values(&[level]).inc();
        if overflow {
            self.context_overflows.inc();
        }
    }

    /// Record how much content made it into context
    pub fn record_selection(&self, messages_dropped: usize, memories_included: usize) {
        self.messages_dropped.inc_by(messages_dropped as f64);
        self.memories_included.inc_by(memories_included as f64);
    }

    /// Record a block that was cut to fit
    pub fn record_truncation(&self, block: &str) {
        self.truncated_blocks.with_label_values(&[block]).inc();
    }

    /// Record a summarization recommendation
    pub fn record_summarization(&self) {
        self.summarization_recommendations.inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_assembly() {
        let metrics = Metrics::new().unwrap();
        metrics.record_assembly("anthropic", 42, "ok", false);
        metrics.record_assembly("ollama", 100, "critical", true);

        assert_eq!(metrics.context_overflows.get(), 1.0);
        assert_eq!(
            metrics.context_assemblies.with_label_values(&["ollama"]).get(),
            1.0
        );
    }

    #[test]
    fn test_record_selection_and_truncation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_selection(12, 3);
        metrics.record_truncation("summary");
        metrics.record_summarization();

        assert_eq!(metrics.messages_dropped.get(), 12.0);
        assert_eq!(metrics.memories_included.get(), 3.0);
        assert_eq!(metrics.summarization_recommendations.get(), 1.0);
    }

    #[test]
    fn test_export_contains_metric_names() {
        let metrics = Metrics::new().unwrap();
        metrics.record_assembly("google", 10, "ok", false);
        let exported = metrics.export_prometheus();
        assert!(exported.contains("context_assemblies_total"));
        assert!(exported.contains("context_usage_percent"));
    }
}
