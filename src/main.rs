use anyhow::Result;
use power_plant_service::{
    api::{self, AppState},
    config::AppConfig,
    dataset::DatasetCache,
    metrics_server, observability,
    store::{BlobStore, S3Gateway},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr);
    }

    let store: Arc<dyn BlobStore> = Arc::new(S3Gateway::from_config(&cfg.store)?);
    let cache = Arc::new(DatasetCache::new(
        Arc::clone(&store),
        Duration::from_secs(cfg.cache.ttl_secs),
    ));

    let state = AppState {
        store,
        cache,
        default_limit: cfg.query.default_limit,
        max_limit: cfg.query.max_limit,
    };
    let app = api::router(state);

    let addr: SocketAddr = cfg
        .server
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid server.bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, bucket = %cfg.store.bucket_name, "power plant service listening");

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
