use std::path::PathBuf;
use std::sync::Arc;

use multibinder::config::AppConfig;
use multibinder::ingress;
use multibinder::pipeline::{LengthConsoleProcessor, LengthStreamConsumer, TextLengthTransform, TextStreamProducer};
use multibinder::StreamRuntime;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging/tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("Multibinder booting...");

    // Config file: first CLI argument, else MULTIBINDER_CONFIG
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MULTIBINDER_CONFIG").ok())
        .map(PathBuf::from);
    let config = AppConfig::load(config_path)?;

    // Wiring
    let producer = Arc::new(TextStreamProducer::new(config.producer.buffer_capacity));
    let consumer = LengthStreamConsumer::new(LengthConsoleProcessor);
    let runtime = StreamRuntime::start(&config.bindings, producer.clone(), TextLengthTransform, consumer)?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(ingress::serve(
        listener,
        producer,
        config.producer.overflow,
        shutdown.clone(),
    ));

    tracing::info!("Multibinder active. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    shutdown.cancel();
    let served = server.await;
    runtime.shutdown().await;
    served??;

    Ok(())
}
