//! Counters and timers, injected into the services instead of kept as
//! process-wide state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Counter and timer names emitted by the services.
pub mod names {
    pub const PATTERNS_DETECTED: &str = "patterns_detected";
    pub const REFERENCES_RESOLVED: &str = "references_resolved";
    pub const PATTERNS_REJECTED: &str = "patterns_rejected";
    pub const AI_ESCALATIONS: &str = "ai_escalations";
    pub const AI_FAILURES: &str = "ai_failures";
    pub const ARTICLES_ANALYZED: &str = "articles_analyzed";
    pub const IMPACT_QUERIES: &str = "impact_queries";
    pub const IMPACT_NODES: &str = "impact_nodes";
    pub const ARTICLE_ANALYSIS_TIME: &str = "article_analysis_time";
    pub const IMPACT_QUERY_TIME: &str = "impact_query_time";
}

/// Observability sink shared by the services.
pub trait Metrics: Send + Sync {
    /// Adds `by` to the counter `name`.
    fn increment(&self, name: &'static str, by: u64);

    /// Records one elapsed-time sample for the timer `name`.
    fn record_duration(&self, name: &'static str, elapsed: Duration);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn increment(&self, _name: &'static str, _by: u64) {}

    fn record_duration(&self, _name: &'static str, _elapsed: Duration) {}
}

/// Emits every sample as a `tracing` debug event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl Metrics for TracingMetrics {
    fn increment(&self, name: &'static str, by: u64) {
        tracing::debug!(metric = name, by, "counter");
    }

    fn record_duration(&self, name: &'static str, elapsed: Duration) {
        tracing::debug!(
            metric = name,
            elapsed_ms = elapsed.as_millis() as u64,
            "timer"
        );
    }
}

/// Keeps counters and timer samples in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<HashMap<&'static str, u64>>,
    timers: Mutex<HashMap<&'static str, Vec<Duration>>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter; zero if it was never incremented.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of samples recorded for a timer.
    pub fn timer_count(&self, name: &str) -> usize {
        self.timers
            .lock()
            .map(|t| t.get(name).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Metrics for InMemoryMetrics {
    fn increment(&self, name: &'static str, by: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name).or_insert(0) += by;
        }
    }

    fn record_duration(&self, name: &'static str, elapsed: Duration) {
        if let Ok(mut timers) = self.timers.lock() {
            timers.entry(name).or_default().push(elapsed);
        }
    }
}
