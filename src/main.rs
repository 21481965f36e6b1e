use anyhow::{Context, Result};
use pvbridge::logging::{get_logger, init_logging};
use pvbridge::{AppContext, Config, poller};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::locate();
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    let logger = get_logger("main");
    logger.info(&format!(
        "pvbridge {} starting (config: {}, interval: {}s)",
        env!("APP_VERSION"),
        config_path.display(),
        config.update_interval
    ));

    let web_host = config.webserver.host.clone();
    let web_port = config.webserver.port;
    let ctx = Arc::new(AppContext::new(config, Some(config_path)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    #[cfg(feature = "web")]
    let web_task = {
        let ctx = ctx.clone();
        let rx = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = pvbridge::web::serve(ctx, &web_host, web_port, rx).await {
                get_logger("web").error(&format!("Web server error: {}", e));
            }
        })
    };
    #[cfg(not(feature = "web"))]
    let _ = (web_host, web_port);

    let poller_task = tokio::spawn(poller::run(ctx.clone(), shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    logger.info("Shutdown requested");
    let _ = shutdown_tx.send(true);

    if let Err(e) = poller_task.await {
        logger.error(&format!("Poller task failed: {}", e));
    }
    #[cfg(feature = "web")]
    if let Err(e) = web_task.await {
        logger.error(&format!("Web task failed: {}", e));
    }

    logger.info("Shutdown complete");
    Ok(())
}
