use log::{error, info};
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use photo_sync::app::{build_routes, AppState};
use photo_sync::config::Config;
use photo_sync::db::{create_db_pool, Catalog};
use photo_sync::ingest::Ingestor;
use photo_sync::storage_layout::StorageLayout;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let started_at = Instant::now();

    let config = Config::from_env()?;
    let host: IpAddr = config.host.parse()?;
    let addr = SocketAddr::new(host, config.port);

    info!("Starting photo-sync server on {}", addr);
    info!("Database: {}", config.db_path);
    info!("Storage path: {}", config.storage_path);
    info!(
        "Upload limits: {} files, {} bytes each",
        config.limits.max_files, config.limits.max_file_size
    );
    info!(
        "Rate limits: {} requests per {}s on /api, {} uploads per {}s",
        config.api_rate_limit.max_requests,
        config.api_rate_limit.window.as_secs(),
        config.upload_rate_limit.max_requests,
        config.upload_rate_limit.window.as_secs()
    );
    info!("CORS: {:?}", config.cors);

    // Check if port is available BEFORE initializing services
    if !is_port_available(addr) {
        error!(
            "Port {} is already in use. Please stop any existing photo-sync instance or use a different port.",
            config.port
        );
        error!(
            "You can check what's using the port with: lsof -i :{}",
            config.port
        );
        return Err(format!("Port {} is already in use", config.port).into());
    }

    tokio::fs::create_dir_all(&config.storage_path).await?;
    let pool = create_db_pool(&config.db_path, config.db_max_connections).await?;
    let catalog = Catalog::new(pool);
    info!("Database initialized successfully");

    let ingestor = Arc::new(Ingestor::new(
        Arc::new(catalog.clone()),
        StorageLayout::new(&config.storage_path),
        config.limits,
    ));

    let routes = build_routes(AppState {
        catalog: catalog.clone(),
        ingestor,
        started_at,
        failure_reporting: config.failure_reporting,
        static_dir: config.static_dir.as_ref().map(PathBuf::from),
        cors: config.cors.clone(),
        api_rate_limit: config.api_rate_limit,
        upload_rate_limit: config.upload_rate_limit,
    });

    info!("Server started successfully, listening on http://{}", addr);

    tokio::select! {
        _ = warp::serve(routes).run(addr) => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    catalog.close().await;
    info!("Server stopped");

    Ok(())
}

fn is_port_available(addr: SocketAddr) -> bool {
    TcpListener::bind(addr).is_ok()
}
