// src/main.rs - FraudGuard risk scoring gateway
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fraudguard_backend::config::AppConfig;
use fraudguard_backend::handlers;
use fraudguard_backend::routes;
use fraudguard_backend::state::AppState;
use fraudguard_store::{KvStore, RedisKv};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    // Load configuration from environment
    let config = AppConfig::from_env()?;

    // Initialize the KV connection manager
    let redis_manager = fraudguard_store::connect(&config.redis_url).await?;
    let kv: Arc<dyn KvStore> = Arc::new(RedisKv::new(redis_manager));

    // Create application state with dependency injection
    let app_state = AppState::new(kv, config.clone()).await?;

    let app = create_application(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("FraudGuard risk engine starting on {}", addr);
    tracing::info!(
        "Health check available at http://localhost:{}/health",
        config.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn create_application(state: AppState) -> Router {
    Router::new()
        // Health & status
        .route("/health", get(handlers::health::health_check))

        // API v1 routes
        .nest("/api/v1", routes::risk::create_routes())

        // Global middleware stack
        .layer(RequestBodyLimitLayer::new(64 * 1024)) // 64KB limit
        .layer(TraceLayer::new_for_http())

        // Attach application state
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("SIGTERM received, shutting down gracefully...");
        },
    }
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraudguard_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    Ok(())
}
