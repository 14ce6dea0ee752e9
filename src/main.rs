use std::sync::Arc;

use flock::{
    AppState, app,
    blob::{BlobStore, LocalBlobStore, RemoteBlobStore},
    config::Config,
    db,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flock=info,tower_http=info")),
        )
        .init();

    let config = Config::load()?;

    let db_pool = db::connect(&config.database_url, config.db_max_connections).await?;

    let blobs: Arc<dyn BlobStore> = match &config.blob_remote_url {
        Some(endpoint) => {
            info!("storing media at {endpoint}");
            Arc::new(RemoteBlobStore::new(endpoint, config.blob_remote_key.clone()))
        }
        None => {
            tokio::fs::create_dir_all(&config.upload_dir).await?;
            info!("storing media under {}", config.upload_dir.display());
            Arc::new(LocalBlobStore::new(&config.upload_dir, &config.public_url))
        }
    };

    let app = app(AppState::new(db_pool, blobs), &config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
