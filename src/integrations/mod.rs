//! Pluggable features that react to playback state.

mod registry;
mod resume;

use std::sync::Arc;
use thiserror::Error;

use crate::bridge::ViewHandle;
use crate::config::{ConfigError, SettingsStore};
use crate::player::{NormalizedPlaybackState, StateDelta, StateHandle};
use crate::shell::ExternalOpener;

pub use registry::{IntegrationRegistry, RegistryError};
pub use resume::{ResumeIntegration, RESUME_INTEGRATION_ID};

/// Error types for integrations
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Integration was enabled before its context was provided")]
    NotProvided,
    #[error("Settings error: {0}")]
    Settings(#[from] ConfigError),
    #[error("{0}")]
    Failed(String),
}

/// Everything an integration may touch. Handed over once, before the first enable.
#[derive(Clone)]
pub struct IntegrationContext {
    pub state: StateHandle,
    pub view: ViewHandle,
    pub settings: Arc<SettingsStore>,
    pub shell: Arc<dyn ExternalOpener>,
}

/// Lifecycle of an integration: provide, then any number of enable/disable cycles.
///
/// State callbacks are only delivered while enabled.
pub trait Integration: Send {
    fn id(&self) -> &'static str;

    fn provide(&mut self, context: IntegrationContext);

    fn enable(&mut self) -> Result<(), IntegrationError>;

    fn disable(&mut self) -> Result<(), IntegrationError>;

    fn on_state_changed(
        &mut self,
        _previous: &NormalizedPlaybackState,
        _current: &NormalizedPlaybackState,
        _delta: &StateDelta,
    ) -> Result<(), IntegrationError> {
        Ok(())
    }
}
