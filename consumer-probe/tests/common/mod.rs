use std::net::SocketAddr;
use std::sync::Arc;

use httpmock::{Method::GET, Mock, MockServer};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use consumer_probe::config::Config;
use consumer_probe::evaluator::{consumers_query, skew_query};
use consumer_probe::server::serve;

pub const TEST_GROUP: &str = "clickhouse-ingestion";

pub fn test_config(prometheus_url: String) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        prometheus_url,
        kafka_consumer_group: TEST_GROUP.to_string(),
        window_minutes: 5,
        skew_threshold: 4.0,
        min_consumers: 2,
        prom_timeout_ms: 300,
        prom_retries: 0,
        export_prometheus: false,
    }
}

/// One-series instant-vector envelope, the shape Prometheus returns for a
/// group-scoped windowed aggregation.
pub fn vector_body(sample: &str) -> serde_json::Value {
    json!({
        "status": "success",
        "data": {
            "resultType": "vector",
            "result": [
                {"metric": {"consumergroup": TEST_GROUP}, "value": [1_700_000_000.0, sample]}
            ]
        }
    })
}

/// Mocks both signal queries on the given backend.
pub async fn mock_signals<'a>(
    prom: &'a MockServer,
    config: &Config,
    skew: &str,
    consumers: &str,
) -> (Mock<'a>, Mock<'a>) {
    let skew_mock = prom
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/query")
                .query_param("query", skew_query(config));
            then.status(200).json_body(vector_body(skew));
        })
        .await;
    let consumers_mock = prom
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/query")
                .query_param("query", consumers_query(config));
            then.status(200).json_body(vector_body(consumers));
        })
        .await;
    (skew_mock, consumers_mock)
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(
            async move { serve(config, listener, async move { notify.notified().await }).await },
        );
        ServerHandle { addr, shutdown }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("http://{}{}", self.addr, path))
            .send()
            .await
            .expect("failed to send request")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}
