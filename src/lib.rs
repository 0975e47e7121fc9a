pub mod api;
pub mod auth;
pub mod config;
pub mod core_state;
pub mod db;
pub mod mail;
pub mod models;
pub mod patients;
pub mod pipeline;
pub mod registry;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Startup: {0}")]
    Startup(#[from] core_state::StartupError),

    #[error("Async runtime: {0}")]
    Runtime(std::io::Error),

    #[error("Server: {0}")]
    Server(#[from] api::server::ServerError),
}

/// Load configuration, build the services and serve until Ctrl-C / SIGTERM.
///
/// Services are built before the tokio runtime starts: the blocking HTTP
/// clients must not be created inside it.
pub fn run() -> Result<(), RunError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::Config::from_env().inspect_err(|e| tracing::error!("{e}"))?;
    let core = Arc::new(
        core_state::CoreState::from_config(&config).inspect_err(|e| tracing::error!("{e}"))?,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(RunError::Runtime)?;

    let served = runtime.block_on(api::server::serve_until_signal(
        core.clone(),
        config.bind_addr,
        &config.cors_origins,
    ));
    // The last handle on the blocking clients must drop outside the runtime.
    drop(runtime);
    drop(core);
    served?;

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
