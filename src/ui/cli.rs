//! Command-line interface implementation

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use crate::config::Settings;

/// Command-line arguments for ytmd-bridge
#[derive(Parser, Debug)]
#[command(author, version, about = "Playback state bridge and scrobbler for YouTube Music", long_about = None)]
pub struct Args {
    /// Config file path
    #[arg(short, long, env = "YTMD_CONFIG")]
    pub config: Option<String>,

    /// Last.fm API key
    #[arg(long, env = "LASTFM_API_KEY")]
    pub lastfm_api_key: Option<String>,

    /// Last.fm shared secret
    #[arg(long, env = "LASTFM_SECRET", hide_env_values = true)]
    pub lastfm_secret: Option<String>,

    /// Turn scrobbling on regardless of the config file
    #[arg(long)]
    pub enable_lastfm: bool,

    /// Buffered events between the bridge and the state store
    #[arg(long, default_value_t = 256)]
    pub channel_capacity: usize,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

/// CLI front end: argument access and user-facing messages
pub struct Cli {
    pub args: Args,
}

impl Cli {
    /// Create a new CLI instance
    pub fn new() -> Self {
        Cli {
            args: Args::parse(),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        match &self.args.config {
            Some(path) => PathBuf::from(path),
            None => Settings::default_path(),
        }
    }

    /// Command-line values win over the config file.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(api_key) = &self.args.lastfm_api_key {
            settings.lastfm.api_key = api_key.clone();
        }
        if let Some(secret) = &self.args.lastfm_secret {
            settings.lastfm.secret = secret.clone();
        }
        if self.args.enable_lastfm {
            settings.integrations.last_fm_enabled = true;
        }
    }

    /// Display error messages
    pub fn display_error(&self, error: &dyn Error) {
        eprintln!("Error: {}", error);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
