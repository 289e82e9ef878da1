use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lumen::clock::{Clock, SystemClock};
use lumen::config::Config;
use lumen::pipeline::Pipeline;
use lumen::provider::HttpVisionProvider;
use lumen::server::{self, AppState};
use lumen::store::spawn_sweeper;
use lumen::telemetry::{FanoutTelemetry, RingTelemetry, TracingTelemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(store = ?config.store, backend = %config.backend_url, "Lumen booting");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let store = config.build_store(clock.clone())?;
    let provider = Arc::new(HttpVisionProvider::new(
        config.backend_url.clone(),
        config.provider_timeout(),
    ));
    let ring = Arc::new(RingTelemetry::new(config.telemetry_capacity));
    let telemetry = FanoutTelemetry::new()
        .with(ring.clone())
        .with(Arc::new(TracingTelemetry));

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        provider,
        Arc::new(telemetry),
        clock,
        config.pipeline_config(),
    ));

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(store, config.sweep_interval(), shutdown.clone());

    let app = server::router(
        AppState {
            pipeline,
            telemetry: ring,
        },
        config.max_body_bytes,
    );

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "Listening");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
        }
        signal.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    sweeper.await?;
    tracing::info!("Lumen stopped");
    Ok(())
}
