//! Line-delimited JSON host for the bridge: inbound traffic on a reader, executed view
//! commands on a writer.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::ingress::{decode_message, parse_line, BridgeMessage, IngressSender, CHANNEL_REMOTE_CONTROL};
use super::view::{ViewCommand, ViewRequest};
use crate::remote::RemoteCommandDispatcher;

const LOG_TARGET: &str = "ytmd_bridge::bridge::stdio";

/// Last volume the view reported, shared between the reader and the writer.
pub type SharedVolume = Arc<AtomicU8>;

/// Reads bridge messages until EOF, routing playback events to ingress and remote control
/// requests to the dispatcher. Malformed lines are logged and skipped.
pub async fn run_bridge_reader<R>(
    reader: R,
    ingress: IngressSender,
    dispatcher: RemoteCommandDispatcher,
    volume: SharedVolume,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    info!(target: LOG_TARGET, "Bridge reader started.");
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match parse_line(line).and_then(|envelope| decode_message(&envelope)) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(e) => {
                warn!(target: LOG_TARGET, "Dropping bridge message: {}", e);
                continue;
            }
        };

        match message {
            BridgeMessage::Playback(event) => {
                if ingress.send(event).await.is_err() {
                    info!(target: LOG_TARGET, "Pipeline is gone, stopping bridge reader.");
                    break;
                }
            }
            BridgeMessage::VolumeChanged(level) => {
                trace!(target: LOG_TARGET, "View volume is now {}", level);
                volume.store(level, Ordering::Relaxed);
            }
            BridgeMessage::RemoteControl { command, value } => {
                dispatcher.dispatch(&command, value.as_ref()).await;
            }
        }
    }

    info!(target: LOG_TARGET, "Bridge reader reached end of input.");
    Ok(())
}

/// Serializes one executed command as a bridge line.
pub fn encode_command(command: &ViewCommand) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(command)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("channel".to_string(), CHANNEL_REMOTE_CONTROL.into());
    }
    serde_json::to_string(&value)
}

/// Drains the view channel: commands are written out as JSON lines, volume queries are
/// answered from the last reported volume.
pub async fn run_view_writer<W>(
    mut writer: W,
    mut requests: mpsc::Receiver<ViewRequest>,
    volume: SharedVolume,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(request) = requests.recv().await {
        match request {
            ViewRequest::Execute(command) => {
                let line = match encode_command(&command) {
                    Ok(line) => line,
                    Err(e) => {
                        error!(target: LOG_TARGET, "Failed to encode {:?}: {}", command, e);
                        continue;
                    }
                };
                debug!(target: LOG_TARGET, "Forwarding to view: {}", line);
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            ViewRequest::GetVolume(responder) => {
                // Receiver may have given up; nothing to do then
                let _ = responder.send(volume.load(Ordering::Relaxed));
            }
        }
    }
    debug!(target: LOG_TARGET, "View channel closed, writer exiting.");
    Ok(())
}
