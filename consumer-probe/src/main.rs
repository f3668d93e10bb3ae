use envconfig::Envconfig;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use consumer_probe::config::Config;
use consumer_probe::server::serve;

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() {
    setup_tracing();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let bind = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .expect("failed to bind listener");

    info!(
        "consumer-probe starting for group {:?}, listening at {}",
        config.kafka_consumer_group, bind
    );

    serve(config, listener, shutdown()).await;

    info!("exiting");
}
