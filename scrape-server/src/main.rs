use anyhow::Result;
use scrape_queue::observability::init_tracing;
use scrape_server::Settings;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    let settings = Settings::from_env()?;
    init_tracing(settings.log_format, "info").map_err(|e| anyhow::anyhow!(e))?;

    let services = scrape_server::build(&settings).await?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutting down");
        let _ = stop_tx.send(true);
    });

    let workers = if settings.role.runs_worker() {
        Some(services.worker.start()?)
    } else {
        None
    };

    if settings.role.runs_api() {
        let addr = settings.addr();
        info!("[scrape-server] listening on http://{addr}");
        let mut api_stop = stop_rx.clone();
        services
            .app
            .listen_with_shutdown(addr, async move {
                let _ = api_stop.wait_for(|stop| *stop).await;
            })
            .await?;
    } else {
        let _ = stop_rx.wait_for(|stop| *stop).await;
    }

    if let Some(workers) = workers {
        workers.shutdown().await?;
    }
    services.broker.close().await?;

    let metrics = services.observability.metrics().snapshot();
    info!(
        "Stopped after {} dispatched, {} completed, {} failed",
        metrics.jobs_dispatched, metrics.jobs_completed, metrics.jobs_failed
    );
    Ok(())
}
