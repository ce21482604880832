use std::process::ExitCode;
use std::sync::Arc;

use haven_core::config::AppConfig;
use haven_server::{AppState, AppviewProxy, FirehoseHandle, build_router};
use haven_store_sqlite::SqliteStore;

/// Exit codes per spec: 0 clean, 1 config error, 2 store unavailable at
/// startup.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().pretty().init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/single.toml".to_string());
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("failed to load config from {config_path}: {e}");
            return ExitCode::from(1);
        }
    };

    let store = match SqliteStore::connect(&config.store.url).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("store unavailable at startup: {e}");
            return ExitCode::from(2);
        }
    };

    let firehose = FirehoseHandle::spawn(store.clone());
    let appview = AppviewProxy::new(config.appview.backends.clone());
    appview.spawn_health_checks();

    let addr = config.listen_addr.clone();
    let state = AppState::new(store, Arc::new(config), firehose, appview);
    let router = build_router(state);

    tracing::info!("haven-single starting on {}", addr);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {addr}: {e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!("server exited with error: {e}");
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}
