//! Pathdex Server - Main entry point

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use pathdex_common::logging::{init_logging, LogConfig};
use pathdex_server::{api, config::Config, db, ingest::CatalogService};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over the built-in defaults.
    let log_config = LogConfig::from_env().unwrap_or_else(|_| {
        LogConfig::default()
            .with_file_prefix("pathdex-server")
            .with_filter("pathdex_server=debug,pathdex_common=debug,tower_http=debug,sqlx=info")
    });
    init_logging(&log_config)?;

    info!("Starting Pathdex Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_config = db::DbConfig::from_server_config(&config.database);
    let db_pool = db::create_pool(&db_config).await?;

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    let service = CatalogService::new(
        db_pool.clone(),
        Duration::from_secs(config.catalog.lock_wait_secs),
    );

    api::serve(config, db_pool, service).await?;

    info!("Server shut down gracefully");

    Ok(())
}
