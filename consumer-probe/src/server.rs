use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::evaluator::Evaluator;
use crate::prom::PromClient;
use crate::router;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let client = match PromClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("failed to create prometheus client: {}", e);
            return;
        }
    };

    let evaluator = Arc::new(Evaluator::new(client, config.clone()));
    let app = router::router(evaluator, config.clone(), config.export_prometheus);

    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("server exited with error: {}", e);
    }
}
