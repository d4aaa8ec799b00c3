// src/player/run_loop.rs
use super::{PlaybackEvent, PlayerStateStore, PLAYER_LOG_TARGET};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, trace};

/// Applies ingress events to the store, strictly in arrival order, until the ingress
/// channel closes or a shutdown signal arrives.
///
/// Returns the number of events that changed state.
pub async fn run_pipeline(
    store: &mut PlayerStateStore,
    events: &mut mpsc::Receiver<PlaybackEvent>,
    shutdown: &mut broadcast::Receiver<()>,
) -> usize {
    info!(target: PLAYER_LOG_TARGET, "Pipeline loop started.");
    let mut applied = 0usize;

    loop {
        tokio::select! {
            biased; // Check shutdown first

            _ = shutdown.recv() => {
                info!(target: PLAYER_LOG_TARGET, "Shutdown signal received. Exiting pipeline loop.");
                break;
            }

            event = events.recv() => {
                let Some(event) = event else {
                    info!(target: PLAYER_LOG_TARGET, "Ingress channel closed. Exiting pipeline loop.");
                    break;
                };
                let kind = event.kind();
                match store.apply(event) {
                    Some(_) => applied += 1,
                    None => trace!(target: PLAYER_LOG_TARGET, event = kind, "Event did not change state."),
                }
            }
        }
    }

    info!(target: PLAYER_LOG_TARGET, "Pipeline loop finished after {} state change(s).", applied);
    applied
}
