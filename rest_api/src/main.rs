// rest_api/src/main.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use engine::store::SledStore;
use engine::{
    AccessService, AggregationService, AppointmentService, InventoryService, NotificationService,
};
use rest_api::{app, load_config, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = load_config(None).context("failed to load configuration")?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid host/port in configuration")?;

    // The store handle is opened once here and injected; it closes when
    // the process drops the last clone at shutdown.
    let store = Arc::new(
        SledStore::open(&PathBuf::from(&config.data_directory))
            .map_err(|e| anyhow::anyhow!("failed to open store: {}", e))?,
    );

    let state = AppState {
        access: AccessService::new(store.clone(), config.access_config()),
        appointments: AppointmentService::new(store.clone()),
        inventory: InventoryService::new(store.clone(), config.cascade_amend),
        notifications: NotificationService::new(store.clone(), store.clone()),
        aggregation: AggregationService::new(store.clone(), store),
        jwt_secret: Arc::new(config.jwt_secret.clone()),
        secure_cookies: config.secure_cookies,
    };

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("clinic back-office API listening on http://{}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    Ok(())
}
