//! Integration tests for configuration management
//!
//! These tests verify that the configuration system works correctly
//! across module boundaries.

use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use ytmd_bridge::config::{Settings, SettingsNamespace, SettingsStore};

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// Test complete configuration workflow through the store
    #[test]
    fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("nested").join("config.json");

        let store = SettingsStore::open(&config_path)?;
        assert_eq!(store.get(), Settings::default());
        assert!(!config_path.exists());

        store.update(|s| {
            s.lastfm.api_key = "integration-key".to_string();
            s.lastfm.secret = "integration-secret".to_string();
            s.integrations.last_fm_enabled = true;
        })?;
        assert!(config_path.exists());
        store.get().validate()?;

        // A second process sees the same document
        let reopened = SettingsStore::open(&config_path)?;
        assert_eq!(reopened.get(), store.get());
        assert_eq!(reopened.path(), Some(config_path.as_path()));

        // The written file uses the camelCase keys other components read
        let raw = std::fs::read_to_string(&config_path)?;
        assert!(raw.contains("\"lastFMEnabled\": true"));
        Ok(())
    }

    #[test]
    fn test_listeners_see_old_and_new() -> Result<(), Box<dyn Error>> {
        let store = SettingsStore::in_memory(Settings::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(SettingsNamespace::Playback, move |old, new| {
            sink.lock().unwrap().push((
                old.playback.last_video_id.clone(),
                new.playback.last_video_id.clone(),
            ));
        });

        store.update(|s| s.playback.last_video_id = Some("first".to_string()))?;
        store.update(|s| s.playback.last_video_id = Some("second".to_string()))?;
        store.update(|s| s.lastfm.api_key = "unrelated".to_string())?;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (None, Some("first".to_string())),
                (Some("first".to_string()), Some("second".to_string())),
            ]
        );
        Ok(())
    }

    /// Test invalid configuration handling
    #[test]
    fn test_invalid_config_validation() {
        let mut invalid_settings = Settings::default();
        invalid_settings.scrobble.api_url = String::new();

        let result = invalid_settings.validate();
        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("URL cannot be empty"));
        }

        // Enabling Last.fm requires credentials
        let mut no_credentials = Settings::default();
        no_credentials.integrations.last_fm_enabled = true;
        assert!(no_credentials.validate().is_err());
    }

    #[test]
    fn test_corrupt_file_is_reported() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json")?;
        assert!(SettingsStore::open(&config_path).is_err());
        Ok(())
    }
}
