use feedmix::api::{create_router, AppState};
use feedmix::config::manager::DEFAULT_CONFIG_FILE;
use feedmix::config::ConfigManager;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let first = args.next();

    // `feedmix init-config [path]` writes the effective configuration and exits.
    if first.as_deref() == Some("init-config") {
        let path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        let manager = ConfigManager::new();
        manager.load(&path)?;
        manager.save_to_file(&path)?;
        info!("Wrote configuration to {}", path);
        return Ok(());
    }

    let config_path = first.unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    let manager = ConfigManager::new();
    manager.load(&config_path)?;
    let config = manager.get();
    info!(
        "Loaded configuration ({} default feeds, population {}, generations {})",
        config.defaults.feeds.len(),
        config.evolution.population_size,
        config.evolution.max_generations
    );

    let state = Arc::new(AppState::new(&config));
    let app = create_router(state);

    let addr = config.server.address();
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
