//! HTTP server for the café order core.
//!
//! Endpoints: health, orders (create, list, get, status, patch), tables, dashboard stats, reports.

use cafe_pos::audit::StdoutAuditSink;
use cafe_pos::{api, AuthConfig, Config, OrderLifecycle, PosError};
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    let _ = env_logger::try_init();
    if let Err(e) = run().await {
        error!("startup failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PosError> {
    let config = Config::from_env()?;
    let store = config.store_url.connect()?;
    let lifecycle = OrderLifecycle::new(
        store,
        config.tax_percentage,
        config.transition_policy,
        Arc::new(StdoutAuditSink),
    )?;
    lifecycle.ensure_tables(config.table_count).await?;
    let auth = AuthConfig::from_env();
    info!(
        "config store={:?} tax_percentage={} policy={:?} auth_disabled={}",
        config.store_url, config.tax_percentage, config.transition_policy, auth.disable
    );

    let app = api::create_router(Arc::new(lifecycle), auth);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| PosError::Configuration(format!("bind {}: {}", addr, e)))?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| PosError::Persistence(format!("server stopped: {}", e)))
}
