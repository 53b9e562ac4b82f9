use std::sync::Arc;

use clap::Parser;
use haven_core::loading::{
    DurableMirror, InMemoryMirror, JsonFileMirror, create_route_service, seed_if_empty,
};
use haven_core::RouteService;
use haven_server::{AppState, Cli, router};
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting haven-server");

    let mirror: Arc<dyn DurableMirror> = match &config.mirror_path {
        Some(path) => Arc::new(JsonFileMirror::open(path).await?),
        None => {
            tracing::warn!("No mirror_path configured, network changes will not survive a restart");
            Arc::new(InMemoryMirror::new())
        }
    };
    if config.seed_sample {
        seed_if_empty(mirror.as_ref()).await?;
    }

    let (service, writer) = create_route_service(mirror, &config.engine()).await?;
    let service = Arc::new(service);

    let sweeper = config
        .sweep_interval()
        .map(|every| tokio::spawn(sweep_expired_routes(service.clone(), every)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = router(
        AppState::new(service.clone()).with_shutdown(shutdown_rx),
        &config,
    );
    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_tx.send_replace(true);
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
        let _ = sweeper.await;
    }
    // The writer drains queued mirror writes once the last handle is gone
    drop(service);
    if let Err(err) = writer.await {
        tracing::error!("Mirror writer failed: {err}");
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn sweep_expired_routes(service: Arc<RouteService>, every: std::time::Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick fires immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        let removed = service.cleanup_expired_routes();
        tracing::debug!("Cache sweep removed {removed} expired routes");
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
