pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod preprocess;
pub mod registry;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServerConfig};
use crate::dispatch::Dispatcher;
use crate::registry::{ModelRegistry, RegistryError};

/// Anything that stops the process before it starts serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Model registry failed to load: {0}")]
    Registry(#[from] RegistryError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Server error: {0}")]
    Server(String),
}

/// Load every artifact, bind, and serve until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<(), StartupError> {
    tracing::info!(models_dir = %config.models_dir.display(), "Loading model registry");

    // Blocking load; no request can observe a partial registry.
    let models_dir = config.models_dir.clone();
    let registry = tokio::task::spawn_blocking(move || ModelRegistry::load(&models_dir))
        .await
        .map_err(|e| StartupError::Server(format!("registry load task failed: {e}")))??;

    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry)));
    let mut server = api::start_server(dispatcher, config.bind_addr, config.max_upload_bytes)
        .await
        .map_err(StartupError::Server)?;

    tracing::info!(addr = %server.session.server_addr, "Serving predictions");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    server.shutdown();
    server.stopped().await;
    Ok(())
}

pub fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let result = ServerConfig::from_env()
        .map_err(StartupError::from)
        .and_then(|config| {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(serve(config))
        });

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
