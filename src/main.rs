use anyhow::Context;
use tokio::net::TcpListener;

use flipkart_rag::core::config::ConfigService;
use flipkart_rag::core::logging;
use flipkart_rag::server;
use flipkart_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_service = ConfigService::from_env();
    let config = config_service
        .load_config()
        .context("Failed to load configuration")?;
    logging::init(&config.logging);
    if let Some(path) = config_service.config_path() {
        tracing::info!("Config path: {}", path.display());
    }
    tracing::debug!("Effective config: {:?}", config.redacted());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::initialize(config).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, server::router(state))
        .await
        .context("Server error")?;

    Ok(())
}
