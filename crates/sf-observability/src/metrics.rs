//! Metrics collection for Sentinel Fuse.
//!
//! Metric names are defined here as constants so the engines emitting them
//! and the descriptions registered at startup cannot drift apart.

use metrics::{describe_counter, describe_histogram};

/// Incidents produced by the aggregator.
pub const INCIDENTS_AGGREGATED: &str = "sf_incidents_aggregated_total";

/// Vendor sources that returned an error marker instead of data.
pub const SOURCE_ERRORS: &str = "sf_source_errors_total";

/// Model calls that fell back to a deterministic result, labeled by component.
pub const MODEL_FALLBACKS: &str = "sf_model_fallbacks_total";

/// Latency of model completion calls in seconds.
pub const MODEL_LATENCY: &str = "sf_model_latency_seconds";

/// Threat intel cache hits.
pub const INTEL_CACHE_HITS: &str = "sf_intel_cache_hits_total";

/// Threat intel cache misses.
pub const INTEL_CACHE_MISSES: &str = "sf_intel_cache_misses_total";

/// Hunting hypotheses generated, labeled by origin (model or fallback).
pub const HYPOTHESES_GENERATED: &str = "sf_hypotheses_generated_total";

/// Hunt executions completed.
pub const HUNTS_EXECUTED: &str = "sf_hunts_executed_total";

/// Registers descriptions for all Sentinel Fuse metrics.
///
/// Call once at process startup, after installing a metrics recorder.
pub fn register_metrics() {
    describe_counter!(
        INCIDENTS_AGGREGATED,
        "Total number of normalized incidents produced by the aggregator"
    );
    describe_counter!(
        SOURCE_ERRORS,
        "Total number of vendor source calls that returned an error"
    );
    describe_counter!(
        MODEL_FALLBACKS,
        "Total number of model calls recovered via deterministic fallback"
    );
    describe_counter!(INTEL_CACHE_HITS, "Threat intel cache hits");
    describe_counter!(INTEL_CACHE_MISSES, "Threat intel cache misses");
    describe_counter!(
        HYPOTHESES_GENERATED,
        "Total number of hunting hypotheses generated"
    );
    describe_counter!(HUNTS_EXECUTED, "Total number of hunt executions");

    describe_histogram!(MODEL_LATENCY, "Model completion call latency in seconds");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        // describe_* calls are safe to repeat; registration must not panic
        // even without an installed recorder.
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            INCIDENTS_AGGREGATED,
            SOURCE_ERRORS,
            MODEL_FALLBACKS,
            MODEL_LATENCY,
            INTEL_CACHE_HITS,
            INTEL_CACHE_MISSES,
            HYPOTHESES_GENERATED,
            HUNTS_EXECUTED,
        ] {
            assert!(name.starts_with("sf_"), "unprefixed metric: {}", name);
        }
    }
}
