use std::sync::Arc;
use std::time::Duration;

use tokio::{signal, sync::mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use dispatch_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // One pool per logical database, owned by the registry and injected
    // everywhere; nothing holds a global connection.
    let registry = Arc::new(api::db::PoolRegistry::init(&cfg).await?);

    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    let store_service = Arc::new(api::services::stores::StoreService::new(registry.clone()));
    let services = api::handlers::AppServices::new(store_service);

    let state = api::AppState {
        config: cfg.clone(),
        registry: registry.clone(),
        event_sender,
        services,
    };

    let request_timeout = cfg
        .db_statement_timeout_secs
        .map(|secs| secs + 5)
        .unwrap_or(35);
    let app = api::handlers::routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout)));

    let addr = cfg.bind_addr();
    info!(%addr, "starting dispatch-api");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
