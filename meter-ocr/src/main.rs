use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meter_ocr::config::Config;
use meter_ocr::ocr::OcrProvider;
use meter_ocr::pipeline::{run_dispatch_worker, Dispatcher};
use meter_ocr::transport::ConnectionSupervisor;

/// Images waiting for the dispatch worker. Further frames are dropped.
const IMAGE_QUEUE_DEPTH: usize = 16;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meter_ocr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    config.validate()?;

    tracing::info!("Meter OCR service starting: {}", config.sensor.name);
    tracing::info!("  MQTT broker: {}:{}", config.mqtt.broker, config.mqtt.port);
    tracing::info!(
        "  Unit:        {} (class: {})",
        config.sensor.unit,
        config.sensor.device_class
    );
    tracing::info!("  Image topic: {}", config.topics.image);
    tracing::info!("  State topic: {}", config.topics.state);
    tracing::info!(
        "  Gate bounds: -{} / +{}",
        config.gate.max_decrease,
        config.gate.max_increase
    );

    tracing::info!("Initializing OCR provider...");
    let ocr = OcrProvider::new(&config.ocr);
    if !ocr.is_available() {
        tracing::warn!("OCR unavailable - every image will be dropped until restart");
    }

    let (image_tx, image_rx) = tokio::sync::mpsc::channel(IMAGE_QUEUE_DEPTH);
    let (supervisor, publisher) = ConnectionSupervisor::new(&config, image_tx);
    let dispatcher = Dispatcher::new(Arc::new(ocr), Arc::new(publisher), &config);

    let cancel_token = CancellationToken::new();

    tracing::info!("Starting dispatch worker...");
    let worker = tokio::spawn(run_dispatch_worker(
        dispatcher,
        image_rx,
        cancel_token.child_token(),
    ));

    tracing::info!("Starting connection supervisor...");
    let session = tokio::spawn(supervisor.run(cancel_token.child_token()));

    shutdown_signal(cancel_token).await;

    session.await?;
    let dispatcher = worker.await?;
    if let Some(last) = dispatcher.last_accepted() {
        tracing::info!(
            "Last accepted reading: {} {} ({} in history)",
            last,
            config.sensor.unit,
            dispatcher.history().len()
        );
    }

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
