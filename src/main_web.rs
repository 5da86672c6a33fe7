//! Web server entry point

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yadisk_relay::{config::Config, web, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yadisk_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Yandex Disk relay web server starting...");

    // CONFIG_PATH env var or first argument
    let config_path = std::env::var("CONFIG_PATH")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;
    if std::path::Path::new(&config_path).exists() {
        tracing::info!("✅ config loaded: {}", config_path);
    } else {
        tracing::info!("✅ {} not found, using defaults and environment", config_path);
    }
    tracing::info!("🔗 provider API: {}", config.yandex.api_base);

    let port = config.web.port;
    let state = Arc::new(AppState::new(config)?);
    tracing::info!("✅ HTTP client ready");

    let app = web::create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("🌐 listening on http://{}", addr);
    tracing::info!("💚 health check: http://localhost:{}/health", port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
