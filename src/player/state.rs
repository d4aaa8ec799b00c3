use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::events::{PlayState, PlaylistSummary, Track};

/// The canonical "now playing" state. Only [`super::PlayerStateStore`] mutates it;
/// everybody else sees cloned snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedPlaybackState {
    pub current_track: Option<Track>,
    /// Playlist the current track was loaded from, if any.
    pub playlist_id: Option<String>,
    pub play_state: PlayState,
    pub ad_running: bool,
    pub last_track_change_at: Option<DateTime<Utc>>,
    pub progress_seconds: f64,
    pub queue: Option<Arc<serde_json::Value>>,
    pub playlists: Vec<PlaylistSummary>,
}

impl NormalizedPlaybackState {
    pub fn is_playing(&self) -> bool {
        self.play_state == PlayState::Playing
    }
}

/// What a single applied event changed.
#[derive(Debug, Clone, PartialEq)]
pub enum StateDelta {
    TrackChanged { previous: Option<Track>, current: Track },
    PlayStateChanged { previous: PlayState, current: PlayState },
    Progress { seconds: f64 },
    AdStateChanged { running: bool },
    QueueUpdated,
    PlaylistsChanged,
}
