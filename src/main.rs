use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use kastor_scraper::{
    config::Config,
    api::routes::create_router,
    service::ContentScraper,
    storage::S3Store,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().inspect_err(|e| error!("Config load error: {}", e))?;
    info!(store = ?config.store, "configuration loaded");

    let store = S3Store::new(&config.store).await;
    let scraper = ContentScraper::new(&config, Arc::new(store))?;

    let app_state = AppState {
        scraper: Arc::new(scraper),
    };
    let app = create_router(app_state);

    let listener = TcpListener::bind(config.server_addr).await?;
    info!("Listening on {}", config.server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
