//! Last.fm web service client

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use super::models::{ApiErrorBody, SessionResponse, TokenResponse};
use super::signing::RequestParams;
use crate::player::Track;

const LOG_TARGET: &str = "ytmd_bridge::lastfm::api";

pub const ERROR_INVALID_TOKEN: u32 = 4;
pub const ERROR_INVALID_SESSION_KEY: u32 = 9;
pub const ERROR_UNAUTHORIZED_TOKEN: u32 = 14;
pub const ERROR_TOKEN_EXPIRED: u32 = 15;

/// Error types for Last.fm operations
#[derive(Debug, Error)]
pub enum LastFmError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Last.fm error {code}: {message}")]
    Api { code: u32, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),
}

impl LastFmError {
    fn code(&self) -> Option<u32> {
        match self {
            LastFmError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The session key was revoked or is otherwise unusable.
    pub fn is_invalid_session(&self) -> bool {
        self.code() == Some(ERROR_INVALID_SESSION_KEY)
    }

    /// The user has not approved the token yet.
    pub fn is_unauthorized_token(&self) -> bool {
        self.code() == Some(ERROR_UNAUTHORIZED_TOKEN)
    }

    /// The token can never become a session; a new one is needed.
    pub fn is_bad_token(&self) -> bool {
        matches!(self.code(), Some(ERROR_INVALID_TOKEN) | Some(ERROR_TOKEN_EXPIRED))
    }
}

/// Application credentials. The shared secret never shows up in logs.
#[derive(Clone, PartialEq)]
pub struct ApiCredentials {
    pub api_key: String,
    pub shared_secret: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("shared_secret", &"<redacted>")
            .finish()
    }
}

/// The scrobble provider, as seen by the engine.
#[async_trait]
pub trait ScrobbleApi: Send + Sync {
    /// `auth.getToken`: a fresh request token.
    async fn get_token(&self, credentials: &ApiCredentials) -> Result<String, LastFmError>;

    /// `auth.getSession`: exchanges an approved token for a session key.
    async fn get_session(&self, credentials: &ApiCredentials, token: &str) -> Result<String, LastFmError>;

    async fn update_now_playing(
        &self,
        credentials: &ApiCredentials,
        session_key: &str,
        track: &Track,
    ) -> Result<(), LastFmError>;

    /// `timestamp` is the UNIX time (seconds) at which the track started.
    async fn scrobble(
        &self,
        credentials: &ApiCredentials,
        session_key: &str,
        track: &Track,
        timestamp: i64,
    ) -> Result<(), LastFmError>;

    /// Page where the user approves `token`.
    fn authorization_url(&self, api_key: &str, token: &str) -> String;
}

/// HTTP implementation of [`ScrobbleApi`].
#[derive(Clone)]
pub struct LastFmClient {
    client: Client,
    api_url: String,
    auth_url: String,
}

fn track_params(method: &str, credentials: &ApiCredentials, session_key: &str, track: &Track) -> RequestParams {
    RequestParams::new(method, &credentials.api_key)
        .with("sk", session_key)
        .with("artist", track.author.as_str())
        .with("track", track.title.as_str())
        .with_opt("album", track.album.as_deref())
        .with("duration", track.duration_seconds.to_string())
}

impl LastFmClient {
    pub fn new(api_url: &str, auth_url: &str, timeout: Duration) -> Self {
        let client = match Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(target: LOG_TARGET, "Error creating HTTP client with timeout: {:?}. Falling back to default.", e);
                Client::new()
            }
        };
        LastFmClient {
            client,
            api_url: api_url.to_string(),
            auth_url: auth_url.to_string(),
        }
    }

    #[instrument(skip(self, params), fields(method = params.get("method").unwrap_or("?")))]
    async fn get<T: DeserializeOwned>(&self, params: RequestParams) -> Result<T, LastFmError> {
        let url = format!("{}?{}", self.api_url, params.to_query_string());
        let response = self.client.get(&url).send().await?;
        Self::parse(response).await
    }

    #[instrument(skip(self, params), fields(method = params.get("method").unwrap_or("?")))]
    async fn post(&self, params: RequestParams) -> Result<serde_json::Value, LastFmError> {
        let response = self
            .client
            .post(&self.api_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(params.to_form_body())
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Last.fm reports method failures as `{"error": code, "message": ...}`, often with a
    /// non-2xx status, so the body is checked before the status.
    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LastFmError> {
        let status = response.status();
        let body = response.text().await?;
        trace!(target: LOG_TARGET, "Response ({}): {}", status, body);

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| LastFmError::InvalidResponse(format!("HTTP {}: {}", status, e)))?;

        if value.get("error").is_some() {
            let api_error: ApiErrorBody = serde_json::from_value(value)
                .map_err(|e| LastFmError::InvalidResponse(e.to_string()))?;
            return Err(LastFmError::Api {
                code: api_error.error,
                message: api_error.message,
            });
        }
        if !status.is_success() {
            return Err(LastFmError::InvalidResponse(format!("HTTP {}", status)));
        }
        serde_json::from_value(value).map_err(|e| LastFmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ScrobbleApi for LastFmClient {
    async fn get_token(&self, credentials: &ApiCredentials) -> Result<String, LastFmError> {
        let params = RequestParams::new("auth.gettoken", &credentials.api_key)
            .into_signed(&credentials.shared_secret);
        let response: TokenResponse = self.get(params).await?;
        debug!(target: LOG_TARGET, "Received request token.");
        Ok(response.token)
    }

    async fn get_session(&self, credentials: &ApiCredentials, token: &str) -> Result<String, LastFmError> {
        let params = RequestParams::new("auth.getSession", &credentials.api_key)
            .with("token", token)
            .into_signed(&credentials.shared_secret);
        let response: SessionResponse = self.get(params).await?;
        debug!(target: LOG_TARGET, "Session established for {}", response.session.name);
        Ok(response.session.key)
    }

    async fn update_now_playing(
        &self,
        credentials: &ApiCredentials,
        session_key: &str,
        track: &Track,
    ) -> Result<(), LastFmError> {
        let params = track_params("track.updateNowPlaying", credentials, session_key, track)
            .into_signed(&credentials.shared_secret);
        self.post(params).await?;
        Ok(())
    }

    async fn scrobble(
        &self,
        credentials: &ApiCredentials,
        session_key: &str,
        track: &Track,
        timestamp: i64,
    ) -> Result<(), LastFmError> {
        let params = track_params("track.scrobble", credentials, session_key, track)
            .with("timestamp", timestamp.to_string())
            .into_signed(&credentials.shared_secret);
        self.post(params).await?;
        Ok(())
    }

    fn authorization_url(&self, api_key: &str, token: &str) -> String {
        format!(
            "{}?api_key={}&token={}",
            self.auth_url,
            urlencoding::encode(api_key),
            urlencoding::encode(token)
        )
    }
}
