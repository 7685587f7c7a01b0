//! Alarm Service (AlarmSrv)
//!
//! Manages alarm templates, rules, and the active-alarm lifecycle for the
//! Gridmon monitoring platform.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use alarmsrv::api::create_router;
use alarmsrv::backend::{AlarmBackend, MemoryBackend, RedisBackend};
use alarmsrv::config::{AlarmConfig, BackendMode};
use alarmsrv::services::escalation::start_escalation_sweep;
use alarmsrv::services::listener::start_event_listener;
use alarmsrv::services::{BackendPollSource, ReconciliationLoop};
use alarmsrv::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Alarm Service...");

    let config = AlarmConfig::load()?;

    let backend: Arc<dyn AlarmBackend> = match config.backend.mode {
        BackendMode::Redis => Arc::new(RedisBackend::new(&config.backend).await?),
        BackendMode::Memory => {
            warn!("Running with the in-memory backing store; state is not persistent");
            Arc::new(MemoryBackend::new())
        },
    };

    let state = AppState::new(config.clone(), backend.clone());
    let shutdown_token = CancellationToken::new();

    // Reconciliation loop: poll the backing store on a fixed interval
    let reconciler = ReconciliationLoop::new(
        Arc::new(BackendPollSource(backend.clone())),
        state.store.clone(),
        state.stats.clone(),
        Duration::from_secs(config.reconcile.interval_secs),
        chrono::Duration::seconds(config.stats.recent_window_secs as i64),
    );
    let reconciler_handle = reconciler.spawn(shutdown_token.clone());

    // Push delivery: subscribe to occurrence updates when enabled
    let listener_handle = if config.reconcile.push_enabled {
        Some(start_event_listener(
            config.backend.clone(),
            config.stats.clone(),
            state.store.clone(),
            state.stats.clone(),
            shutdown_token.clone(),
        ))
    } else {
        None
    };

    // Escalation sweep, off by default
    let escalation_handle = if config.escalation.enabled {
        Some(start_escalation_sweep(
            backend.clone(),
            state.store.clone(),
            config.escalation.clone(),
            shutdown_token.clone(),
        ))
    } else {
        None
    };

    let app = create_router(state);
    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;
    let tcp_listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Alarm Service started on {}", addr);
    info!("API endpoints:");
    info!("  GET  /health - Health check");
    info!("  GET/POST /api/v1/templates - Template management");
    info!("  POST /api/v1/templates/{{id}}/apply - Apply template to targets");
    info!("  GET  /api/v1/occurrences - Active alarm snapshot");
    info!("  POST /api/v1/occurrences/ack - Bulk acknowledge");
    info!("  GET  /api/v1/stats - Alarm statistics");

    axum::serve(tcp_listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    // Stop background tasks and wait for them to drain
    info!("Shutdown signal received, stopping background tasks");
    shutdown_token.cancel();
    let _ = reconciler_handle.await;
    if let Some(handle) = listener_handle {
        let _ = handle.await;
    }
    if let Some(handle) = escalation_handle {
        let _ = handle.await;
    }

    info!("Alarm Service stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!(
                    "Failed to install SIGTERM handler: {}. Service will only respond to Ctrl+C",
                    e
                );
                None
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(mut sig) = term_signal {
                    sig.recv().await;
                } else {
                    std::future::pending::<()>().await
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
