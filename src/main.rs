use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use support_rag::core::config::service::redacted;
use support_rag::core::config::{AppPaths, ConfigService};
use support_rag::core::logging;
use support_rag::server;
use support_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let paths = Arc::new(AppPaths::new());
    logging::init(&paths, "server.log");

    let config = ConfigService::new(paths.clone());
    let settings = config
        .load()
        .with_context(|| format!("Failed to load {}", config.config_path().display()))?;
    tracing::info!("Settings: {}", redacted(&settings));

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::initialize(settings).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
