//! Application settings and configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";
pub const DEFAULT_AUTH_URL: &str = "https://www.last.fm/api/auth/";
pub const DEFAULT_MAX_ELIGIBLE_DELAY_SECS: u64 = 240;

/// Application settings, persisted as a single JSON document.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub lastfm: LastFmSettings,
    #[serde(default)]
    pub appearance: AppearanceSettings,
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub integrations: IntegrationSettings,
    #[serde(default)]
    pub scrobble: ScrobbleSettings,
}

/// Last.fm account link. Mutated only by the scrobble engine's auth flow.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct LastFmSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "sessionKey")]
    pub session_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AppearanceSettings {
    /// Consumed by the custom CSS integration, which lives outside this crate.
    #[serde(default, rename = "customCSSPath")]
    pub custom_css_path: Option<String>,
    #[serde(default, rename = "alwaysShowVolumeSlider")]
    pub always_show_volume_slider: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PlaybackSettings {
    #[serde(default, rename = "continueWhereYouLeftOff")]
    pub continue_where_you_left_off: bool,
    #[serde(default, rename = "continueWhereYouLeftOffPaused")]
    pub continue_where_you_left_off_paused: bool,
    #[serde(default, rename = "lastVideoId")]
    pub last_video_id: Option<String>,
    #[serde(default, rename = "lastPlaylistId")]
    pub last_playlist_id: Option<String>,
}

/// Which integrations should be running.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct IntegrationSettings {
    #[serde(default, rename = "lastFMEnabled")]
    pub last_fm_enabled: bool,
}

/// Scrobble provider endpoints and timing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScrobbleSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_max_eligible_delay")]
    pub max_eligible_delay_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_max_eligible_delay() -> u64 {
    DEFAULT_MAX_ELIGIBLE_DELAY_SECS
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ScrobbleSettings {
    fn default() -> Self {
        ScrobbleSettings {
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            max_eligible_delay_secs: default_max_eligible_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Error types for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Settings {
    /// Load settings from a file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("ytmd-bridge").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scrobble.api_url.is_empty() {
            return Err(ConfigError::ValidationError("Scrobble API URL cannot be empty".to_string()));
        }
        if self.scrobble.auth_url.is_empty() {
            return Err(ConfigError::ValidationError("Scrobble auth URL cannot be empty".to_string()));
        }

        if self.integrations.last_fm_enabled
            && (self.lastfm.api_key.is_empty() || self.lastfm.secret.is_empty())
        {
            return Err(ConfigError::ValidationError(
                "Last.fm is enabled but the API key or shared secret is missing".to_string(),
            ));
        }

        Ok(())
    }
}
