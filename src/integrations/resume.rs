//! Continue where you left off: remembers the last played track across restarts.

use serde_json::json;
use tracing::{debug, info, warn};

use super::{Integration, IntegrationContext, IntegrationError};
use crate::bridge::ViewCommand;
use crate::player::{NormalizedPlaybackState, StateDelta};

const LOG_TARGET: &str = "ytmd_bridge::integrations::resume";

pub const RESUME_INTEGRATION_ID: &str = "continue-where-you-left-off";

#[derive(Default)]
pub struct ResumeIntegration {
    context: Option<IntegrationContext>,
}

impl ResumeIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(&self) -> Result<&IntegrationContext, IntegrationError> {
        self.context.as_ref().ok_or(IntegrationError::NotProvided)
    }
}

impl Integration for ResumeIntegration {
    fn id(&self) -> &'static str {
        RESUME_INTEGRATION_ID
    }

    fn provide(&mut self, context: IntegrationContext) {
        self.context = Some(context);
    }

    fn enable(&mut self) -> Result<(), IntegrationError> {
        let context = self.context()?;
        let playback = context.settings.get().playback;

        let Some(video_id) = playback.last_video_id else {
            debug!(target: LOG_TARGET, "Nothing to resume.");
            return Ok(());
        };

        // Something is already loaded; don't yank it away.
        if context.state.borrow().current_track.is_some() {
            return Ok(());
        }

        info!(target: LOG_TARGET, "Resuming {}", video_id);
        let endpoint = json!({
            "watchEndpoint": {
                "videoId": video_id,
                "playlistId": playback.last_playlist_id,
            }
        });
        if let Err(e) = context.view.try_execute(ViewCommand::Navigate(endpoint)) {
            warn!(target: LOG_TARGET, "Could not ask the view to resume: {}", e);
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<(), IntegrationError> {
        Ok(())
    }

    fn on_state_changed(
        &mut self,
        _previous: &NormalizedPlaybackState,
        current: &NormalizedPlaybackState,
        delta: &StateDelta,
    ) -> Result<(), IntegrationError> {
        let StateDelta::TrackChanged { current: track, .. } = delta else {
            return Ok(());
        };
        let video_id = track.video_id.clone();
        let playlist_id = current.playlist_id.clone();
        self.context()?.settings.update(|settings| {
            settings.playback.last_video_id = Some(video_id);
            settings.playback.last_playlist_id = playlist_id;
        })?;
        Ok(())
    }
}
