use anyhow::Context;
use tracing::info;

use photo_bot::config::AppConfig;
use photo_bot::logging;
use photo_bot::services::ServiceContainer;

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Read (and scrub) the environment while the process is single-threaded.
    let config = AppConfig::from_env().context("invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    // Initialize logging
    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;
    config.log_summary();

    let services = ServiceContainer::from_config(config)?;
    if let Some(log_dir) = services.config.log_dir.as_deref() {
        logging::start_retention_cleanup(log_dir, services.cancellation_token());
    }

    services.start().await.context("failed to start bot")?;

    wait_for_shutdown_signal().await;
    info!("Shutdown signal received");

    services.shutdown().await?;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
