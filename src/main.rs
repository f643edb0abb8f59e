use std::sync::Arc;

use telecare_sync::config::Config;
use telecare_sync::services::portal::PortalClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telecare_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load environment configuration");

    let api = Arc::new(PortalClient::new(config.portal_base_url.clone()));
    let engine = telecare_sync::create_engine(&config, api).expect("Failed to open state mirror");

    match engine.resume_from_mirror().await {
        Ok(()) => tracing::info!("Reconciliation runtime started"),
        Err(e) => tracing::warn!("Could not resume persisted watches: {}", e),
    }

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    engine.timers().stop_all().await;
    tracing::info!("Shutting down");
}
