//! Desktop shell services used by integrations.

use thiserror::Error;
use tracing::info;

const LOG_TARGET: &str = "ytmd_bridge::shell";

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Could not open {url}: {reason}")]
    OpenFailed { url: String, reason: String },
}

/// Opens a URL with whatever the host considers the external browser.
pub trait ExternalOpener: Send + Sync {
    fn open_external(&self, url: &str) -> Result<(), ShellError>;
}

/// Headless opener: prints the URL on stderr so the user can follow it by hand.
/// Stdout belongs to the bridge.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOpener;

impl ExternalOpener for ConsoleOpener {
    fn open_external(&self, url: &str) -> Result<(), ShellError> {
        info!(target: LOG_TARGET, "Open in your browser: {}", url);
        eprintln!("Open this URL in your browser to continue: {}", url);
        Ok(())
    }
}
