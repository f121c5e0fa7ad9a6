use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use live_notify::app::App;
use live_notify::config::AppConfig;
use live_notify::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("invalid configuration")?;
    let _log_guard = init_logging(config.log_dir.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        channels = config.channels.len(),
        chat_id = %config.telegram.chat_id,
        "Starting live-notify"
    );

    let app = App::build(&config).context("failed to start")?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    app.run(cancel).await;

    info!("live-notify stopped");
    Ok(())
}
