//! Translates external control requests into validated view commands.

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::bridge::{RepeatMode, ViewCommand, ViewHandle};

const LOG_TARGET: &str = "ytmd_bridge::remote";

/// Volume change applied by `volumeUp`/`volumeDown`.
pub const VOLUME_STEP: i16 = 10;
pub const MAX_VOLUME: i16 = 100;

/// Validates remote control requests and forwards them to the view.
///
/// Never touches playback state: whatever the view does in response comes back through
/// ingress like any other change. Invalid input is dropped without surfacing an error.
#[derive(Clone)]
pub struct RemoteCommandDispatcher {
    view: ViewHandle,
}

impl RemoteCommandDispatcher {
    pub fn new(view: ViewHandle) -> Self {
        Self { view }
    }

    #[instrument(skip(self, value))]
    pub async fn dispatch(&self, command: &str, value: Option<&Value>) {
        let resolved = match command {
            "playPause" => Some(ViewCommand::PlayPause),
            "play" => Some(ViewCommand::Play),
            "pause" => Some(ViewCommand::Pause),
            "next" => Some(ViewCommand::Next),
            "previous" => Some(ViewCommand::Previous),
            "mute" => Some(ViewCommand::Mute),
            "unmute" => Some(ViewCommand::Unmute),
            "volumeUp" => self.stepped_volume(VOLUME_STEP).await,
            "volumeDown" => self.stepped_volume(-VOLUME_STEP).await,
            "setVolume" => value.and_then(parse_volume).map(ViewCommand::SetVolume),
            "repeatMode" => value
                .and_then(Value::as_str)
                .and_then(RepeatMode::parse)
                .map(ViewCommand::RepeatMode),
            "navigate" => value.filter(|v| v.is_object()).cloned().map(ViewCommand::Navigate),
            "thumbsUp" | "thumbsDown" => {
                debug!(target: LOG_TARGET, "{} is not supported by the view yet.", command);
                None
            }
            _ => {
                debug!(target: LOG_TARGET, "Dropping unknown remote command {}", command);
                None
            }
        };

        let Some(view_command) = resolved else {
            debug!(target: LOG_TARGET, "Remote command {} dropped (value: {:?}).", command, value);
            return;
        };

        if let Err(e) = self.view.execute(view_command).await {
            warn!(target: LOG_TARGET, "Failed to forward {}: {}", command, e);
        }
    }

    async fn stepped_volume(&self, step: i16) -> Option<ViewCommand> {
        match self.view.volume().await {
            Ok(current) => {
                let target = (current as i16 + step).clamp(0, MAX_VOLUME);
                Some(ViewCommand::SetVolume(target as u8))
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Could not read current volume: {}", e);
                None
            }
        }
    }
}

/// Accepts an integer in `[0, 100]`, given as a JSON number or a numeric string.
/// Whole floats such as `50.0` count as integers.
pub fn parse_volume(value: &Value) -> Option<u8> {
    let level = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0).map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    if (0..=MAX_VOLUME as i64).contains(&level) {
        Some(level as u8)
    } else {
        None
    }
}
