use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub session: SessionInfo,
}

#[derive(Debug, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub name: String,
    pub key: String,
}

/// Error body returned with any method failure.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: u32,
    #[serde(default)]
    pub message: String,
}
