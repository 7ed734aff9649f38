//! Campus Exchange API: entry point.
//!
//! Accepts product-for-product exchange offers as multipart uploads, writes
//! the uploaded files under the upload root, persists both offer records to
//! SQLite and exposes the task list endpoints used by the admin views.

mod api;
mod config;
mod db;
mod errors;
mod intake;
mod records;
mod storage;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use storage::UploadStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    tokio::fs::create_dir_all(&config.upload_root).await?;
    info!("Storing uploads under {}", config.upload_root.display());

    let state = Arc::new(api::ApiState {
        pool,
        store: UploadStore::new(&config.upload_root),
        max_upload_bytes: config.max_upload_bytes,
    });
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
