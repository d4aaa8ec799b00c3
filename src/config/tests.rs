//! Tests for configuration management module

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.scrobble.api_url, "https://ws.audioscrobbler.com/2.0/");
        assert_eq!(settings.scrobble.auth_url, "https://www.last.fm/api/auth/");
        assert_eq!(settings.scrobble.max_eligible_delay_secs, 240);
        assert!(settings.lastfm.session_key.is_none());
        assert!(!settings.integrations.last_fm_enabled);
    }

    #[test]
    fn test_settings_save_and_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");

        let mut settings = Settings::default();
        settings.lastfm.api_key = "test-api-key".to_string();
        settings.lastfm.secret = "test-secret".to_string();
        settings.lastfm.session_key = Some("test-session".to_string());
        settings.playback.continue_where_you_left_off = true;

        settings.save(&config_path)?;
        assert!(config_path.exists());

        let loaded = Settings::load(&config_path)?;
        assert_eq!(loaded, settings);
        Ok(())
    }

    #[test]
    fn test_wire_key_names() -> Result<(), Box<dyn std::error::Error>> {
        let json = r#"{
            "lastfm": { "api_key": "k", "secret": "s", "token": "t", "sessionKey": "sk" },
            "appearance": { "customCSSPath": "/tmp/a.css" },
            "playback": { "continueWhereYouLeftOff": true }
        }"#;
        let settings: Settings = serde_json::from_str(json)?;
        assert_eq!(settings.lastfm.session_key.as_deref(), Some("sk"));
        assert_eq!(settings.lastfm.token.as_deref(), Some("t"));
        assert_eq!(settings.appearance.custom_css_path.as_deref(), Some("/tmp/a.css"));
        assert!(settings.playback.continue_where_you_left_off);
        // Missing sections fall back to defaults
        assert_eq!(settings.scrobble, ScrobbleSettings::default());
        Ok(())
    }

    #[test]
    fn test_missing_file_loads_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let loaded = Settings::load(&dir.path().join("nope.json"))?;
        assert_eq!(loaded, Settings::default());
        Ok(())
    }

    #[test]
    fn test_settings_validation() {
        let valid_settings = Settings::default();
        assert!(valid_settings.validate().is_ok());

        let mut missing_credentials = Settings::default();
        missing_credentials.integrations.last_fm_enabled = true;
        assert!(matches!(
            missing_credentials.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut empty_url = Settings::default();
        empty_url.scrobble.api_url = String::new();
        assert!(empty_url.validate().is_err());
    }

    #[test]
    fn test_default_path() {
        let path = Settings::default_path();
        assert!(path.to_str().unwrap().contains(".config/ytmd-bridge/config.json"));
    }

    #[test]
    fn test_store_persists_updates() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        let store = SettingsStore::open(&config_path)?;

        store.update(|s| s.lastfm.token = Some("abc".to_string()))?;

        let reloaded = Settings::load(&config_path)?;
        assert_eq!(reloaded.lastfm.token.as_deref(), Some("abc"));
        assert_eq!(store.get().lastfm.token.as_deref(), Some("abc"));
        Ok(())
    }

    #[test]
    fn test_listeners_are_scoped_to_namespace() {
        let store = SettingsStore::in_memory(Settings::default());
        let lastfm_calls = Arc::new(AtomicUsize::new(0));
        let playback_calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let lastfm_calls = lastfm_calls.clone();
            let seen = seen.clone();
            store.subscribe(SettingsNamespace::LastFm, move |old, new| {
                lastfm_calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push((old.lastfm.token.clone(), new.lastfm.token.clone()));
            });
        }
        {
            let playback_calls = playback_calls.clone();
            store.subscribe(SettingsNamespace::Playback, move |_, _| {
                playback_calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        store.update(|s| s.lastfm.token = Some("t1".to_string())).unwrap();
        // No-op update does not notify anyone
        store.update(|s| s.lastfm.token = Some("t1".to_string())).unwrap();

        assert_eq!(lastfm_calls.load(Ordering::SeqCst), 1);
        assert_eq!(playback_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[(None, Some("t1".to_string()))]
        );
    }
}
