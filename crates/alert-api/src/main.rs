//! Alert subscription API server.

use alert_api::config::AppConfig;
use alert_api::server::{self, AppState};
use alert_core::GraphSubscriptions;
use alert_graph::SharedStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let shared = SharedStore::new(config.store.clone());
    // A store that cannot be opened is fatal: nothing is served without it.
    let store = shared.get().await?;
    let service = GraphSubscriptions::new(store).with_timeout(config.store.op_timeout());
    let state = Arc::new(AppState {
        service: Arc::new(service),
    });

    let app = server::router(state);
    tracing::info!("alert API listening on {}", config.listen);
    axum::serve(
        tokio::net::TcpListener::bind(config.listen).await?,
        app.into_make_service(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown requested");
    })
    .await?;
    Ok(())
}
