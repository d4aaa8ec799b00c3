use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::events::PlaybackEvent;
use super::state::{NormalizedPlaybackState, StateDelta};

const LOG_TARGET: &str = "ytmd_bridge::player::store";

/// Receives every state change, synchronously and in registration order.
///
/// Implementations must not block: they run inside the single writer's `apply`.
pub trait StateSubscriber: Send + Sync {
    fn on_state_changed(
        &self,
        previous: &NormalizedPlaybackState,
        current: &NormalizedPlaybackState,
        delta: &StateDelta,
    );
}

/// Read-only view of the latest state, for components that poll rather than subscribe.
pub type StateHandle = watch::Receiver<NormalizedPlaybackState>;

fn same_subscriber(a: &Arc<dyn StateSubscriber>, b: &Arc<dyn StateSubscriber>) -> bool {
    // Compare data pointers only; vtable pointers are not stable across codegen units.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Single authoritative owner of [`NormalizedPlaybackState`].
///
/// `apply` takes `&mut self`, so exactly one writer (the pipeline loop) can feed it.
pub struct PlayerStateStore {
    state: NormalizedPlaybackState,
    subscribers: Vec<Arc<dyn StateSubscriber>>,
    publisher: watch::Sender<NormalizedPlaybackState>,
}

impl PlayerStateStore {
    pub fn new() -> Self {
        let state = NormalizedPlaybackState::default();
        let (publisher, _) = watch::channel(state.clone());
        Self {
            state,
            subscribers: Vec::new(),
            publisher,
        }
    }

    pub fn state(&self) -> &NormalizedPlaybackState {
        &self.state
    }

    /// Returns a handle that always yields the latest published state.
    pub fn handle(&self) -> StateHandle {
        self.publisher.subscribe()
    }

    /// Adds a subscriber. Returns `false` if this exact handler was already registered.
    pub fn subscribe(&mut self, subscriber: Arc<dyn StateSubscriber>) -> bool {
        if self.subscribers.iter().any(|s| same_subscriber(s, &subscriber)) {
            trace!(target: LOG_TARGET, "Subscriber already registered, ignoring.");
            return false;
        }
        self.subscribers.push(subscriber);
        debug!(target: LOG_TARGET, "Subscriber added ({} total).", self.subscribers.len());
        true
    }

    /// Removes a subscriber. Unknown handlers are ignored and `false` is returned.
    pub fn unsubscribe(&mut self, subscriber: &Arc<dyn StateSubscriber>) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| !same_subscriber(s, subscriber));
        before != self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Applies one ingress event. Returns `None` when canonical state did not change, in
    /// which case nobody is notified.
    pub fn apply(&mut self, event: PlaybackEvent) -> Option<StateDelta> {
        let kind = event.kind();
        let mut next = self.state.clone();
        let delta = Self::reduce(&mut next, event)?;

        trace!(target: LOG_TARGET, event = kind, "State changed: {:?}", delta);
        let previous = std::mem::replace(&mut self.state, next);
        // send_replace never fails, even without receivers
        self.publisher.send_replace(self.state.clone());

        for subscriber in &self.subscribers {
            subscriber.on_state_changed(&previous, &self.state, &delta);
        }
        Some(delta)
    }

    fn reduce(state: &mut NormalizedPlaybackState, event: PlaybackEvent) -> Option<StateDelta> {
        match event {
            PlaybackEvent::ProgressTick { seconds } => {
                if !state.is_playing() {
                    return None;
                }
                if !seconds.is_finite() || seconds < 0.0 {
                    warn!(target: LOG_TARGET, "Ignoring invalid progress value: {}", seconds);
                    return None;
                }
                if state.progress_seconds == seconds {
                    return None;
                }
                state.progress_seconds = seconds;
                Some(StateDelta::Progress { seconds })
            }
            PlaybackEvent::StateChanged { state: play_state } => {
                if state.play_state == play_state {
                    return None;
                }
                let previous = state.play_state;
                state.play_state = play_state;
                Some(StateDelta::PlayStateChanged { previous, current: play_state })
            }
            PlaybackEvent::TrackLoaded { track, playlist_id } => {
                if state.current_track.as_ref() == Some(&track) {
                    trace!(target: LOG_TARGET, video_id = %track.video_id, "Suppressing reload of current track.");
                    return None;
                }
                debug!(target: LOG_TARGET, "Track changed to {}", track);
                let previous = state.current_track.replace(track.clone());
                state.playlist_id = playlist_id;
                state.progress_seconds = 0.0;
                state.last_track_change_at = Some(Utc::now());
                Some(StateDelta::TrackChanged { previous, current: track })
            }
            PlaybackEvent::AdStateChanged { running } => {
                if state.ad_running == running {
                    return None;
                }
                state.ad_running = running;
                Some(StateDelta::AdStateChanged { running })
            }
            PlaybackEvent::QueueSnapshot { snapshot } => {
                if state.queue.as_deref() == Some(snapshot.as_ref()) {
                    return None;
                }
                state.queue = Some(snapshot);
                Some(StateDelta::QueueUpdated)
            }
            PlaybackEvent::PlaylistCreated { playlist } => {
                if state.playlists.iter().any(|p| p.id == playlist.id) {
                    return None;
                }
                state.playlists.push(playlist);
                Some(StateDelta::PlaylistsChanged)
            }
            PlaybackEvent::PlaylistDeleted { playlist_id } => {
                let before = state.playlists.len();
                state.playlists.retain(|p| p.id != playlist_id);
                if before == state.playlists.len() {
                    return None;
                }
                Some(StateDelta::PlaylistsChanged)
            }
        }
    }
}

impl Default for PlayerStateStore {
    fn default() -> Self {
        Self::new()
    }
}
