//! Outbound command channel toward the embedded view.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Repeat modes understood by the player's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RepeatMode {
    None,
    All,
    One,
}

impl RepeatMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NONE" => Some(RepeatMode::None),
            "ALL" => Some(RepeatMode::All),
            "ONE" => Some(RepeatMode::One),
            _ => None,
        }
    }
}

/// A validated command, ready for the view to execute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "value", rename_all = "camelCase")]
pub enum ViewCommand {
    PlayPause,
    Play,
    Pause,
    Next,
    Previous,
    SetVolume(u8),
    Mute,
    Unmute,
    RepeatMode(RepeatMode),
    Navigate(Value),
}

/// Requests carried by the view channel.
#[derive(Debug)]
pub enum ViewRequest {
    Execute(ViewCommand),
    GetVolume(oneshot::Sender<u8>),
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("View channel closed")]
    Closed,
    #[error("View channel full")]
    Full,
    #[error("View did not answer the request")]
    NoResponse,
}

/// Cloneable handle used by the dispatcher and integrations to reach the view.
#[derive(Clone, Debug)]
pub struct ViewHandle {
    tx: mpsc::Sender<ViewRequest>,
}

impl ViewHandle {
    pub async fn execute(&self, command: ViewCommand) -> Result<(), ViewError> {
        self.tx
            .send(ViewRequest::Execute(command))
            .await
            .map_err(|_| ViewError::Closed)
    }

    /// Non-blocking variant for synchronous callers.
    pub fn try_execute(&self, command: ViewCommand) -> Result<(), ViewError> {
        self.tx
            .try_send(ViewRequest::Execute(command))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ViewError::Full,
                mpsc::error::TrySendError::Closed(_) => ViewError::Closed,
            })
    }

    /// Asks the view for its current volume.
    pub async fn volume(&self) -> Result<u8, ViewError> {
        let (responder, response) = oneshot::channel();
        self.tx
            .send(ViewRequest::GetVolume(responder))
            .await
            .map_err(|_| ViewError::Closed)?;
        response.await.map_err(|_| ViewError::NoResponse)
    }
}

pub fn view_channel(capacity: usize) -> (ViewHandle, mpsc::Receiver<ViewRequest>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ViewHandle { tx }, rx)
}
