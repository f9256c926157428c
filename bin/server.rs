// Vehicle Registry - Web Server
// Thin entry point: config, tracing, middleware. Routes live in vehicle_registry::api.

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};
use vehicle_registry::api::{build_router, AppState};
use vehicle_registry::{Registry, RegistryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = RegistryConfig::from_env()?;
    let registry = Registry::open(&config)
        .with_context(|| format!("failed to open registry at {}", config.database_path.display()))?;
    info!("database opened: {}", config.database_path.display());

    let app = build_router(AppState::new(registry))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!("🚀 vehicle registry listening on http://{}", config.bind_addr);
    info!("   API: http://{}/api/health", config.bind_addr);

    axum::serve(listener, app).await.context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
