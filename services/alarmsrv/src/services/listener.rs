//! Redis listener for pushed occurrence updates
//!
//! Subscribes to the backing store's events channel and merges each delivered
//! occurrence into the store. Delivery may race the polling loop; the store
//! merge is idempotent per id, so double delivery is harmless.

use anyhow::Result;
use futures::StreamExt;
use gridmon_model::AlarmOccurrence;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BackendConfig, StatsConfig};
use crate::services::reconciler::{refresh_statistics, StatsCell};
use crate::store::{OccurrenceStore, UpsertOutcome};

/// Start the push listener; it stops when `token` is cancelled
pub fn start_event_listener(
    backend_config: BackendConfig,
    stats_config: StatsConfig,
    store: Arc<OccurrenceStore>,
    stats_cell: StatsCell,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let recent_window = chrono::Duration::seconds(stats_config.recent_window_secs as i64);

        loop {
            if token.is_cancelled() {
                break;
            }

            match subscribe(&backend_config).await {
                Ok(mut stream) => {
                    info!(
                        "Listening for occurrence updates on {}",
                        backend_config.events_channel
                    );

                    loop {
                        let msg = tokio::select! {
                            _ = token.cancelled() => {
                                info!("Event listener stopped");
                                return;
                            },
                            msg = stream.next() => msg,
                        };

                        let Some(msg) = msg else {
                            warn!("Event subscription closed, reconnecting");
                            break;
                        };

                        if let Ok(payload) = msg.get_payload::<String>() {
                            if let Err(e) =
                                process_event(&store, &stats_cell, recent_window, &payload).await
                            {
                                error!("Failed to process occurrence event: {}", e);
                            }
                        }
                    }
                },
                Err(e) => {
                    error!("Event subscription failed: {}", e);
                    tokio::select! {
                        _ = token.cancelled() => {
                            info!("Event listener stopped");
                            return;
                        },
                        _ = tokio::time::sleep(Duration::from_secs(5)) => {},
                    }
                },
            }
        }

        info!("Event listener stopped");
    })
}

async fn subscribe(
    config: &BackendConfig,
) -> Result<std::pin::Pin<Box<dyn futures::Stream<Item = redis::Msg> + Send>>> {
    let client = redis::Client::open(config.redis_url.as_str())?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(&config.events_channel).await?;
    Ok(Box::pin(pubsub.into_on_message()))
}

/// Merge one pushed occurrence into the store
async fn process_event(
    store: &OccurrenceStore,
    stats_cell: &StatsCell,
    recent_window: chrono::Duration,
    payload: &str,
) -> Result<()> {
    let occurrence: AlarmOccurrence = serde_json::from_str(payload)?;
    let id = occurrence.id;

    match store.upsert(occurrence).await {
        UpsertOutcome::Unchanged => {
            debug!("Duplicate delivery for occurrence {}, ignored", id);
        },
        outcome => {
            debug!("Pushed occurrence {} merged ({:?})", id, outcome);
            refresh_statistics(store, stats_cell, recent_window).await;
        },
    }

    Ok(())
}
