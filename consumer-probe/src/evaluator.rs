use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::metrics::record_evaluation;
use crate::prom::{SignalResult, SignalSource};

pub const SKEW_SERIES: &str = "kafka_consumergroup_partition_skew";
pub const MEMBERS_SERIES: &str = "kafka_consumergroup_members";

/// Running maximum of the partition skew ratio over the configured window.
/// The window is the anti-flapping mechanism: a momentary spike is absorbed
/// unless the breach is sustained for the whole window.
pub fn skew_query(config: &Config) -> String {
    format!(
        "max_over_time({SKEW_SERIES}{{consumergroup=\"{}\"}}[{}m])",
        config.kafka_consumer_group, config.window_minutes
    )
}

/// Running minimum of the active member count over the same window, so a
/// brief rebalance dip (e.g. a rolling deploy) does not flip readiness.
pub fn consumers_query(config: &Config) -> String {
    format!(
        "min_over_time({MEMBERS_SERIES}{{consumergroup=\"{}\"}}[{}m])",
        config.kafka_consumer_group, config.window_minutes
    )
}

/// One full readiness verdict. Immutable once built; every evaluation
/// produces a fresh instance.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub healthy: bool,
    pub reasons: Vec<String>,
    pub skew: SignalResult,
    pub consumers: SignalResult,
    pub evaluated_at: DateTime<Utc>,
    pub duration_ms: f64,
}

pub struct Evaluator {
    source: Arc<dyn SignalSource>,
    config: Config,
}

/// A signal only counts when the query succeeded and the sample is finite.
/// Absence of data always fails safe, never passes.
fn usable_value(signal: &SignalResult) -> Option<f64> {
    if !signal.ok {
        return None;
    }
    signal.value.filter(|v| v.is_finite())
}

fn failure_reason(signal: &SignalResult) -> String {
    if signal.ok {
        "no usable value".to_string()
    } else {
        signal.error.to_string()
    }
}

impl Evaluator {
    pub fn new(source: Arc<dyn SignalSource>, config: Config) -> Self {
        Self { source, config }
    }

    /// Runs both signal queries, applies the thresholds, and returns the
    /// combined verdict. Retry lives entirely in the query client; this
    /// level only classifies. Observed exactly once by metrics and logs.
    pub async fn evaluate(&self) -> EvaluationResult {
        let started = Instant::now();

        let skew = self.source.query(&skew_query(&self.config)).await;
        let consumers = self.source.query(&consumers_query(&self.config)).await;

        let mut reasons = Vec::new();

        match usable_value(&skew) {
            Some(v) if v <= self.config.skew_threshold => {}
            Some(v) => reasons.push(format!(
                "skew {v} exceeds threshold {}",
                self.config.skew_threshold
            )),
            None => reasons.push(format!("skew query failed: {}", failure_reason(&skew))),
        }

        match usable_value(&consumers) {
            Some(v) if v >= self.config.min_consumers as f64 => {}
            Some(v) => reasons.push(format!(
                "consumers {v} below minimum {}",
                self.config.min_consumers
            )),
            None => reasons.push(format!(
                "consumers query failed: {}",
                failure_reason(&consumers)
            )),
        }

        let result = EvaluationResult {
            healthy: reasons.is_empty(),
            reasons,
            skew,
            consumers,
            evaluated_at: Utc::now(),
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        info!(
            healthy = result.healthy,
            skew = ?result.skew.value,
            consumers = ?result.consumers.value,
            duration_ms = result.duration_ms,
            reasons = ?result.reasons,
            "readiness evaluated"
        );
        record_evaluation(&result);

        result
    }
}
