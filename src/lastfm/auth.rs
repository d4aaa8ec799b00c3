//! Desktop authorization flow: request token, user approval, session key.

use tracing::{debug, info, instrument, warn};

use super::api::{ApiCredentials, LastFmError, ScrobbleApi};
use crate::shell::ExternalOpener;

const LOG_TARGET: &str = "ytmd_bridge::lastfm::auth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    SessionEstablished(String),
    /// The user still has to approve `token` in the browser.
    AwaitingApproval { token: String },
}

/// Tries the stored token first; only when it is missing or can never be exchanged is a
/// fresh token requested and its authorization page opened.
#[instrument(skip_all)]
pub async fn establish_session(
    api: &dyn ScrobbleApi,
    shell: &dyn ExternalOpener,
    credentials: &ApiCredentials,
    stored_token: Option<&str>,
) -> Result<AuthOutcome, LastFmError> {
    if let Some(token) = stored_token {
        match api.get_session(credentials, token).await {
            Ok(session_key) => {
                info!(target: LOG_TARGET, "Last.fm session established.");
                return Ok(AuthOutcome::SessionEstablished(session_key));
            }
            Err(e) if e.is_unauthorized_token() => {
                debug!(target: LOG_TARGET, "Stored token not approved yet.");
                return Ok(AuthOutcome::AwaitingApproval {
                    token: token.to_string(),
                });
            }
            Err(e) if e.is_bad_token() => {
                debug!(target: LOG_TARGET, "Stored token rejected ({}), requesting a new one.", e);
            }
            Err(e) => return Err(e),
        }
    }

    let token = api.get_token(credentials).await?;
    let url = api.authorization_url(&credentials.api_key, &token);
    info!(target: LOG_TARGET, "Last.fm authorization required.");
    if let Err(e) = shell.open_external(&url) {
        warn!(target: LOG_TARGET, "Could not open the authorization page: {}", e);
    }
    Ok(AuthOutcome::AwaitingApproval { token })
}
