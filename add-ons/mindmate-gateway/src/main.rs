//! MindMate gateway: HTTP surface for journal entries, mood records and AI chat.

mod app;
mod error;
mod handlers;
mod rate_limit;

use mindmate_core::AppConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // .env is optional; plain environment variables work without it.
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = dotenv_result {
        tracing::debug!("[SYSTEM] No .env loaded ({}); using process environment", e);
    }

    if let Err(e) = run().await {
        tracing::error!("[SYSTEM] Gateway failed to start: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::load()?;
    let state = Arc::new(app::AppState::from_config(&config)?);

    tracing::info!(
        "[SYSTEM] MindMate v{} starting in {} mode; store {}",
        mindmate_core::version(),
        config.mode.as_str(),
        state.store.cache().connector().target()
    );
    if state.ai.is_configured() {
        tracing::info!("[SYSTEM] AI chat enabled (model {})", state.ai.model());
    } else {
        tracing::warn!(
            "[SYSTEM] No AI credential configured (MINDMATE_AI__API_KEY or OPENROUTER_API_KEY); /api/ai/chat will answer 500"
        );
    }

    if config.rate_limit.enabled {
        tracing::info!(
            "[SYSTEM] Rate limit: {} requests per {}s per client",
            config.rate_limit.max_requests,
            config.rate_limit.window_secs
        );
    }
    let app = app::build_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[SYSTEM] Listening on http://{}", addr);

    // Peer addresses key the per-client rate limit.
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("[SYSTEM] Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("[SYSTEM] Could not install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("[SYSTEM] Shutdown signal received");
}
