use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};

use crate::evaluator::EvaluationResult;

pub const PROBE_CHECKS_TOTAL: &str = "probe_checks_total";
pub const PROBE_LAST_STATUS: &str = "probe_last_status";
pub const PROBE_CHECK_DURATION_SECONDS: &str = "probe_check_duration_seconds";

/// Register all metrics with descriptions
pub fn register_metrics() {
    describe_counter!(
        PROBE_CHECKS_TOTAL,
        "Readiness evaluations performed, by result"
    );
    describe_gauge!(
        PROBE_LAST_STATUS,
        "Result of the most recent readiness evaluation (1 healthy, 0 unhealthy)"
    );
    describe_histogram!(
        PROBE_CHECK_DURATION_SECONDS,
        "Wall-clock duration of a full two-signal evaluation"
    );
}

fn result_label(result: &EvaluationResult) -> &'static str {
    // Both signals failing to produce a value means we could not verify
    // health at all, which is worth telling apart from a measured breach.
    if !result.skew.ok && !result.consumers.ok {
        "error"
    } else if result.healthy {
        "healthy"
    } else {
        "unhealthy"
    }
}

/// Record one evaluation. Called exactly once per `Evaluator::evaluate`.
pub fn record_evaluation(result: &EvaluationResult) {
    counter!(PROBE_CHECKS_TOTAL, "result" => result_label(result)).increment(1);
    gauge!(PROBE_LAST_STATUS).set(if result.healthy { 1.0 } else { 0.0 });
    histogram!(PROBE_CHECK_DURATION_SECONDS).record(result.duration_ms / 1000.0);
}
