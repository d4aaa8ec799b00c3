use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Playback state as reported by the embedded player.
///
/// Wire values follow the upstream player's enumeration: 0 unstarted, 1 playing, 2 paused,
/// 3 buffering, 5 ended. There is no 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlayState {
    #[default]
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
}

impl TryFrom<i64> for PlayState {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PlayState::Unstarted),
            1 => Ok(PlayState::Playing),
            2 => Ok(PlayState::Paused),
            3 => Ok(PlayState::Buffering),
            5 => Ok(PlayState::Ended),
            other => Err(other),
        }
    }
}

/// An immutable track description. Two tracks are equal when their `video_id` matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub video_id: String,
    pub title: String,
    pub author: String,
    pub album: Option<String>,
    pub duration_seconds: u64,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.video_id == other.video_id
    }
}

impl Eq for Track {}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} [{}]", self.author, self.title, self.video_id)
    }
}

/// A playlist seen being created in the embedded view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
}

/// Raw events delivered by the bridge, one pipeline pass each.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    ProgressTick { seconds: f64 },
    StateChanged { state: PlayState },
    TrackLoaded { track: Track, playlist_id: Option<String> },
    AdStateChanged { running: bool },
    /// Opaque queue store snapshot; never interpreted by this crate.
    QueueSnapshot { snapshot: Arc<serde_json::Value> },
    PlaylistCreated { playlist: PlaylistSummary },
    PlaylistDeleted { playlist_id: String },
}

impl PlaybackEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackEvent::ProgressTick { .. } => "progress_tick",
            PlaybackEvent::StateChanged { .. } => "state_changed",
            PlaybackEvent::TrackLoaded { .. } => "track_loaded",
            PlaybackEvent::AdStateChanged { .. } => "ad_state_changed",
            PlaybackEvent::QueueSnapshot { .. } => "queue_snapshot",
            PlaybackEvent::PlaylistCreated { .. } => "playlist_created",
            PlaybackEvent::PlaylistDeleted { .. } => "playlist_deleted",
        }
    }
}
