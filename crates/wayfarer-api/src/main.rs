use std::net::SocketAddr;
use std::sync::Arc;

use wayfarer_api::{routes, telemetry, AppState};
use wayfarer_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    telemetry::init();

    let config = Config::from_env()?;
    tracing::info!(
        environment = %config.environment,
        scan_posture = ?config.scan_posture(),
        "Starting wayfarer ingestion service"
    );

    let state = Arc::new(AppState::new(config.clone()));
    if !state.scanner.health_check().await {
        tracing::warn!(
            host = %config.clamav_host,
            port = config.clamav_port,
            "Scanning daemon did not answer PING at startup"
        );
    }

    let router = routes::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, router).await?;

    Ok(())
}
