pub mod api;
pub mod autosave;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Database;
use crate::engine::CellEngine;
use crate::events::ChangeNotifier;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: CellEngine,
    pub notifier: ChangeNotifier,
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the server with the given configuration
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    // Initialize database
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    db.migrate().await?;

    // Shutdown signal: stops retry backoffs and flushes the auto-save queue
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let notifier = ChangeNotifier::default();
    let engine = CellEngine::new(db.clone(), notifier.clone(), shutdown_rx.clone());
    let autosave = autosave::spawn(config.autosave.clone(), &notifier, shutdown_rx);

    let state = AppState {
        db,
        engine,
        notifier,
    };
    let app = router(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = autosave {
        let _ = task.await;
    }

    Ok(())
}
