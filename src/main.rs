use tracing_subscriber::EnvFilter;

use receipt_search::api;
use receipt_search::config::Config;
use receipt_search::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Receipt store: {}", config.store_path().display());
    tracing::info!(
        "Embedding dimension {} (timeout {}s)",
        config.embedding.dimension,
        config.embedding.timeout_secs
    );

    let state = AppState::new(config.clone())?;

    let providers = state.adapter.available_providers();
    if providers.is_empty() {
        tracing::warn!("No embedding provider configured; search will use text tiers only");
    } else {
        tracing::info!("Embedding providers: {}", providers.join(" -> "));
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
