use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::{Integration, IntegrationContext, IntegrationError, RESUME_INTEGRATION_ID};
use crate::config::Settings;
use crate::lastfm::LASTFM_INTEGRATION_ID;
use crate::player::{NormalizedPlaybackState, StateDelta, StateSubscriber};

const LOG_TARGET: &str = "ytmd_bridge::integrations";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Integration {0} is already registered")]
    DuplicateId(String),
    #[error("No integration registered as {0}")]
    UnknownIntegration(String),
    #[error("Integration {id} failed: {source}")]
    Integration {
        id: String,
        #[source]
        source: IntegrationError,
    },
    #[error("Integration {id} panicked: {message}")]
    Panicked { id: String, message: String },
}

struct Entry {
    integration: Box<dyn Integration>,
    enabled: bool,
}

/// Owns the integrations and fans state changes out to the enabled ones.
///
/// A failing or panicking integration is logged and skipped; it never reaches the store
/// or the integrations registered after it.
pub struct IntegrationRegistry {
    context: IntegrationContext,
    entries: Mutex<Vec<Entry>>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl IntegrationRegistry {
    pub fn new(context: IntegrationContext) -> Self {
        Self {
            context,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Adds an integration in the disabled state and hands it its context.
    pub fn register(&self, mut integration: Box<dyn Integration>) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let id = integration.id();
        if entries.iter().any(|e| e.integration.id() == id) {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }
        integration.provide(self.context.clone());
        debug!(target: LOG_TARGET, "Registered integration {}", id);
        entries.push(Entry {
            integration,
            enabled: false,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn enable(&self, id: &str) -> Result<(), RegistryError> {
        self.set_enabled(id, true)
    }

    #[instrument(skip(self))]
    pub fn disable(&self, id: &str) -> Result<(), RegistryError> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .iter_mut()
            .find(|e| e.integration.id() == id)
            .ok_or_else(|| RegistryError::UnknownIntegration(id.to_string()))?;

        if entry.enabled == enabled {
            return Ok(());
        }

        let integration = &mut entry.integration;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            if enabled {
                integration.enable()
            } else {
                integration.disable()
            }
        }));

        match outcome {
            Ok(Ok(())) => {
                entry.enabled = enabled;
                info!(
                    target: LOG_TARGET,
                    "Integration {} {}.",
                    id,
                    if enabled { "enabled" } else { "disabled" }
                );
                Ok(())
            }
            Ok(Err(source)) => Err(RegistryError::Integration {
                id: id.to_string(),
                source,
            }),
            Err(payload) => Err(RegistryError::Panicked {
                id: id.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|e| e.integration.id() == id && e.enabled)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|e| e.integration.id())
            .collect()
    }

    /// Brings every known integration in line with its settings toggle.
    /// Failures are logged per integration so one bad toggle does not block the rest.
    pub fn apply_settings(&self, settings: &Settings) {
        let wanted = [
            (LASTFM_INTEGRATION_ID, settings.integrations.last_fm_enabled),
            (RESUME_INTEGRATION_ID, settings.playback.continue_where_you_left_off),
        ];
        for (id, enabled) in wanted {
            match self.set_enabled(id, enabled) {
                Ok(()) | Err(RegistryError::UnknownIntegration(_)) => {}
                Err(e) => error!(target: LOG_TARGET, "{}", e),
            }
        }
    }

    pub fn disable_all(&self) {
        for id in self.ids() {
            if let Err(e) = self.disable(id) {
                warn!(target: LOG_TARGET, "{}", e);
            }
        }
    }
}

impl StateSubscriber for IntegrationRegistry {
    fn on_state_changed(
        &self,
        previous: &NormalizedPlaybackState,
        current: &NormalizedPlaybackState,
        delta: &StateDelta,
    ) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for entry in entries.iter_mut().filter(|e| e.enabled) {
            let integration = &mut entry.integration;
            let id = integration.id();
            match catch_unwind(AssertUnwindSafe(|| {
                integration.on_state_changed(previous, current, delta)
            })) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(target: LOG_TARGET, "Integration {} failed to handle state change: {}", id, e)
                }
                Err(payload) => error!(
                    target: LOG_TARGET,
                    "Integration {} panicked while handling state change: {}",
                    id,
                    panic_message(payload.as_ref())
                ),
            }
        }
    }
}
