use std::sync::Arc;
use std::time::Duration;

use tilerealm::config;
use tilerealm::gateway::{self, GatewayState};
use tilerealm::store::SqliteWorldStore;

use auth::BearerDecoder;
use room::RoomRegistry;
use world_db::WorldDb;

#[tokio::main]
async fn main() {
    observability::init_logging();

    let config = config::load_from_args();
    tracing::info!("Tilerealm server starting...");

    let db = match WorldDb::open(&config.db.path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(path = %config.db.path, "Failed to open database: {}", e);
            std::process::exit(1);
        }
    };
    let store = Arc::new(SqliteWorldStore::new(db));
    let registry = Arc::new(RoomRegistry::new(store, config.to_room_config()));

    let state = GatewayState::new(
        Arc::clone(&registry),
        Arc::new(BearerDecoder),
        config.security.clone(),
    );
    let app = gateway::router(state);

    let listener = match tokio::net::TcpListener::bind(&config.net.ws_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %config.net.ws_addr, "Failed to bind: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Gateway listening on {}", config.net.ws_addr);

    // Stop plumbing: the signal flips the watch, axum stops accepting and
    // drains, rooms save and close their sessions.
    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(());
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = stop_rx.changed().await;
        tracing::info!("Gateway draining connections");
    });

    tokio::select! {
        _ = stop_requested() => {
            let _ = stop_tx.send(());
            registry.shutdown_all().await;
            // Give rooms a moment to deliver close frames and finish their
            // final saves before the process exits.
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
    }

    tracing::info!("Server stopped.");
}

/// Resolves when the operator asks the process to stop: Ctrl+C everywhere,
/// plus SIGTERM on Unix so container runtimes get a clean exit. If a watcher
/// cannot be installed the process simply runs until killed.
async fn stop_requested() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot watch Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot watch SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
    tracing::info!("Stop signal received, shutting down...");
}
