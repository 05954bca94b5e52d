//! SSE relay entry point.
//!
//! Loads configuration, installs tracing, wires the channel directory to the
//! wake scheduler and serves the relay router until ctrl-c or SIGTERM.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sse_relay::adapters::{
    relay_router, InMemoryChannelMetrics, InMemoryRateLimiter, RelayState,
    StaticTokenAuthenticator, SystemClock, TokioWakeScheduler,
};
use sse_relay::application::{ChannelDirectory, MetricsFactory};
use sse_relay::config::AppConfig;
use sse_relay::domain::foundation::ChannelName;
use sse_relay::ports::{ChannelMetrics, Clock, WakeScheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config)?;
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "sse relay starting"
    );

    run(config, shutdown_signal()).await
}

fn init_tracing(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.server.log_level)?,
    };

    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
    Ok(())
}

async fn run<F>(config: AppConfig, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "sse relay listening");
    serve(listener, config, shutdown).await
}

/// Serves the relay on `listener` until `shutdown` resolves.
///
/// Event streams never end on their own, so once `shutdown` fires every
/// channel closes its sessions before the server drains connections.
async fn serve<F>(
    listener: tokio::net::TcpListener,
    config: AppConfig,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (scheduler, wakes) = TokioWakeScheduler::new(clock.clone());
    let scheduler = Arc::new(scheduler);

    let metrics_factory: MetricsFactory = Arc::new(|_: &ChannelName| {
        Arc::new(InMemoryChannelMetrics::new()) as Arc<dyn ChannelMetrics>
    });
    let directory = Arc::new(ChannelDirectory::new(
        config.channel.to_limits(),
        clock.clone(),
        scheduler.clone() as Arc<dyn WakeScheduler>,
        metrics_factory,
    ));

    let wake_shutdown = CancellationToken::new();
    let wake_loop = tokio::spawn(
        directory
            .clone()
            .run_wake_loop(wakes, wake_shutdown.clone()),
    );

    let state = RelayState::new(
        directory.clone(),
        Arc::new(StaticTokenAuthenticator::new(config.auth.api_token.clone())),
        Arc::new(InMemoryRateLimiter::new(
            config.rate_limit.to_bucket_config(),
            clock,
        )),
    );
    let app = relay_router(state, &config.server.http_options());

    let drain = {
        let scheduler = scheduler.clone();
        let wake_shutdown = wake_shutdown.clone();
        async move {
            shutdown.await;
            tracing::info!(
                pending_wakes = scheduler.pending_count(),
                "stopping keepalive and closing event streams"
            );
            scheduler.shutdown();
            wake_shutdown.cancel();
            directory.shutdown().await;
        }
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(drain)
    .await?;

    let _ = wake_loop.await;
    tracing::info!("sse relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
