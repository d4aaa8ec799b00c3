//! Shared settings store with namespace-scoped change notifications.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

use super::settings::{ConfigError, Settings};

const LOG_TARGET: &str = "ytmd_bridge::config::store";

/// Top-level sections of the settings document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsNamespace {
    LastFm,
    Appearance,
    Playback,
    Integrations,
    Scrobble,
}

impl SettingsNamespace {
    fn changed(self, old: &Settings, new: &Settings) -> bool {
        match self {
            SettingsNamespace::LastFm => old.lastfm != new.lastfm,
            SettingsNamespace::Appearance => old.appearance != new.appearance,
            SettingsNamespace::Playback => old.playback != new.playback,
            SettingsNamespace::Integrations => old.integrations != new.integrations,
            SettingsNamespace::Scrobble => old.scrobble != new.scrobble,
        }
    }
}

/// Callback receiving `(old, new)` settings.
pub type SettingsListener = Arc<dyn Fn(&Settings, &Settings) + Send + Sync + 'static>;

/// Get/set/subscribe access to the settings document.
///
/// Listeners run on the caller of [`SettingsStore::update`], after the new document has been
/// committed and the internal lock released, so a listener may read the store again.
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: Mutex<Settings>,
    listeners: Mutex<Vec<(SettingsNamespace, SettingsListener)>>,
}

impl SettingsStore {
    /// Opens a file-backed store. A missing file yields default settings.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let settings = Settings::load(path)?;
        Ok(Self::with_settings(settings, Some(path.to_path_buf())))
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(settings: Settings) -> Self {
        Self::with_settings(settings, None)
    }

    fn with_settings(settings: Settings, path: Option<PathBuf>) -> Self {
        SettingsStore {
            path,
            current: Mutex::new(settings),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of the current settings.
    pub fn get(&self) -> Settings {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Applies `mutate` to a copy of the settings, persists it and commits it.
    /// Listeners of every namespace that changed are then called with `(old, new)`.
    #[instrument(skip(self, mutate))]
    pub fn update<F>(&self, mutate: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Settings),
    {
        let (old, new) = {
            let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
            let old = guard.clone();
            let mut new = old.clone();
            mutate(&mut new);
            if new == old {
                return Ok(());
            }
            if let Some(path) = &self.path {
                new.save(path)?;
            }
            *guard = new.clone();
            (old, new)
        };

        let listeners: Vec<SettingsListener> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(namespace, _)| namespace.changed(&old, &new))
            .map(|(_, listener)| listener.clone())
            .collect();

        debug!(target: LOG_TARGET, "Settings updated, notifying {} listener(s).", listeners.len());
        for listener in listeners {
            listener(&old, &new);
        }
        Ok(())
    }

    /// Registers a listener for changes within `namespace`.
    pub fn subscribe<F>(&self, namespace: SettingsNamespace, listener: F)
    where
        F: Fn(&Settings, &Settings) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((namespace, Arc::new(listener)));
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
