use std::time::Duration;

use envconfig::Envconfig;
use serde::Serialize;

/// Evaluation parameters, loaded once at startup and never mutated.
/// Serialized into the `/status` body so operators can see the active
/// thresholds without shelling into the container.
#[derive(Envconfig, Debug, Clone, Serialize)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "::")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3305")]
    pub port: u16,

    #[envconfig(from = "PROMETHEUS_URL", default = "http://prometheus:9090")]
    pub prometheus_url: String,

    #[envconfig(from = "KAFKA_CONSUMERGROUP")]
    pub kafka_consumer_group: String,

    #[envconfig(from = "WINDOW_MINUTES", default = "5")]
    pub window_minutes: u64,

    #[envconfig(from = "SKEW_THRESHOLD", default = "4.0")]
    pub skew_threshold: f64,

    #[envconfig(from = "MIN_CONSUMERS", default = "2")]
    pub min_consumers: u64,

    #[envconfig(from = "PROM_TIMEOUT_MS", default = "1500")]
    pub prom_timeout_ms: u64,

    #[envconfig(from = "PROM_RETRIES", default = "2")]
    pub prom_retries: u32,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}

impl Config {
    /// Deadline for a single query attempt. The worst case for one
    /// `/ready` call is `2 * (prom_retries + 1)` attempts at this timeout,
    /// which must stay under the orchestrator's own check timeout.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.prom_timeout_ms)
    }
}
