//! Decoding of raw bridge messages into typed events, and the ingress channel.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::player::{PlayState, PlaybackEvent, PlaylistSummary, Track};

const LOG_TARGET: &str = "ytmd_bridge::bridge::ingress";

pub const CHANNEL_PROGRESS: &str = "ytmView:videoProgressChanged";
pub const CHANNEL_STATE: &str = "ytmView:videoStateChanged";
pub const CHANNEL_VIDEO_DATA: &str = "ytmView:videoDataChanged";
pub const CHANNEL_AD_STATE: &str = "ytmView:adStateChanged";
pub const CHANNEL_STORE_STATE: &str = "ytmView:storeStateChanged";
pub const CHANNEL_PLAYLIST_CREATED: &str = "ytmView:createPlaylistObserved";
pub const CHANNEL_PLAYLIST_DELETED: &str = "ytmView:deletePlaylistObserved";
pub const CHANNEL_VOLUME: &str = "ytmView:volumeChanged";
pub const CHANNEL_REMOTE_CONTROL: &str = "remoteControl:execute";

/// Error types for inbound bridge traffic
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing argument {index} for {channel}")]
    MissingArgument { channel: String, index: usize },
    #[error("Invalid payload for {channel}: {reason}")]
    InvalidPayload { channel: String, reason: String },
    #[error("Unknown player state {0}")]
    UnknownPlayState(i64),
    #[error("Ingress channel closed")]
    Closed,
}

/// One line of bridge traffic: `{"channel": "...", "args": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeEnvelope {
    pub channel: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Everything the bridge can tell us, after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeMessage {
    Playback(PlaybackEvent),
    /// Volume reported by the view; only used to answer volume queries.
    VolumeChanged(u8),
    RemoteControl { command: String, value: Option<Value> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVideoDetails {
    video_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    length_seconds: Option<NumberOrText>,
}

/// The player reports some numbers as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn as_seconds(&self) -> Option<u64> {
        let value = match self {
            NumberOrText::Number(n) => *n,
            NumberOrText::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        if value.is_finite() && value >= 0.0 {
            Some(value.round() as u64)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    id: String,
    #[serde(default)]
    title: String,
}

fn arg<'a>(envelope: &'a BridgeEnvelope, index: usize) -> Result<&'a Value, IngressError> {
    envelope.args.get(index).ok_or_else(|| IngressError::MissingArgument {
        channel: envelope.channel.clone(),
        index,
    })
}

fn invalid(envelope: &BridgeEnvelope, reason: impl Into<String>) -> IngressError {
    IngressError::InvalidPayload {
        channel: envelope.channel.clone(),
        reason: reason.into(),
    }
}

/// Parses one line of bridge traffic.
pub fn parse_line(line: &str) -> Result<BridgeEnvelope, IngressError> {
    Ok(serde_json::from_str(line)?)
}

/// Validates an envelope. Unknown channels yield `Ok(None)`.
#[instrument(skip(envelope), fields(channel = %envelope.channel))]
pub fn decode_message(envelope: &BridgeEnvelope) -> Result<Option<BridgeMessage>, IngressError> {
    let message = match envelope.channel.as_str() {
        CHANNEL_PROGRESS => {
            let seconds = arg(envelope, 0)?
                .as_f64()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| invalid(envelope, "progress must be a non-negative number"))?;
            BridgeMessage::Playback(PlaybackEvent::ProgressTick { seconds })
        }
        CHANNEL_STATE => {
            let raw = arg(envelope, 0)?
                .as_i64()
                .ok_or_else(|| invalid(envelope, "state must be an integer"))?;
            let state = PlayState::try_from(raw).map_err(IngressError::UnknownPlayState)?;
            BridgeMessage::Playback(PlaybackEvent::StateChanged { state })
        }
        CHANNEL_VIDEO_DATA => {
            let details: RawVideoDetails = serde_json::from_value(arg(envelope, 0)?.clone())?;
            if details.video_id.is_empty() {
                return Err(invalid(envelope, "videoId is empty"));
            }
            let duration_seconds = details
                .length_seconds
                .as_ref()
                .and_then(NumberOrText::as_seconds)
                .unwrap_or(0);
            let playlist_id = envelope
                .args
                .get(1)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let track = Track {
                video_id: details.video_id,
                title: details.title,
                author: details.author,
                album: details.album.filter(|a| !a.is_empty()),
                duration_seconds,
            };
            BridgeMessage::Playback(PlaybackEvent::TrackLoaded { track, playlist_id })
        }
        CHANNEL_AD_STATE => {
            let running = arg(envelope, 0)?
                .as_bool()
                .ok_or_else(|| invalid(envelope, "ad state must be a boolean"))?;
            BridgeMessage::Playback(PlaybackEvent::AdStateChanged { running })
        }
        CHANNEL_STORE_STATE => {
            let snapshot = Arc::new(arg(envelope, 0)?.clone());
            BridgeMessage::Playback(PlaybackEvent::QueueSnapshot { snapshot })
        }
        CHANNEL_PLAYLIST_CREATED => {
            let raw: RawPlaylist = serde_json::from_value(arg(envelope, 0)?.clone())?;
            BridgeMessage::Playback(PlaybackEvent::PlaylistCreated {
                playlist: PlaylistSummary { id: raw.id, title: raw.title },
            })
        }
        CHANNEL_PLAYLIST_DELETED => {
            let playlist_id = arg(envelope, 0)?
                .as_str()
                .ok_or_else(|| invalid(envelope, "playlist id must be a string"))?
                .to_string();
            BridgeMessage::Playback(PlaybackEvent::PlaylistDeleted { playlist_id })
        }
        CHANNEL_VOLUME => {
            let volume = arg(envelope, 0)?
                .as_f64()
                .ok_or_else(|| invalid(envelope, "volume must be a number"))?;
            BridgeMessage::VolumeChanged(volume.clamp(0.0, 100.0).round() as u8)
        }
        CHANNEL_REMOTE_CONTROL => {
            let command = arg(envelope, 0)?
                .as_str()
                .ok_or_else(|| invalid(envelope, "command must be a string"))?
                .to_string();
            let value = envelope.args.get(1).cloned().filter(|v| !v.is_null());
            BridgeMessage::RemoteControl { command, value }
        }
        other => {
            debug!(target: LOG_TARGET, "Ignoring message on unknown channel {}", other);
            return Ok(None);
        }
    };
    Ok(Some(message))
}

/// Sending half of the ingress channel. Cloneable; events keep their send order.
#[derive(Clone, Debug)]
pub struct IngressSender {
    tx: mpsc::Sender<PlaybackEvent>,
}

impl IngressSender {
    pub async fn send(&self, event: PlaybackEvent) -> Result<(), IngressError> {
        self.tx.send(event).await.map_err(|_| IngressError::Closed)
    }
}

/// Creates the typed inbound channel feeding the pipeline loop.
pub fn ingress_channel(capacity: usize) -> (IngressSender, mpsc::Receiver<PlaybackEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (IngressSender { tx }, rx)
}
