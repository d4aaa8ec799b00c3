//! Last.fm integration: request signing, the web service client, the auth flow and the
//! scrobble engine.

mod api;
mod auth;
mod models;
mod scrobbler;
mod signing;

pub use api::{
    ApiCredentials, LastFmClient, LastFmError, ScrobbleApi, ERROR_INVALID_SESSION_KEY,
    ERROR_INVALID_TOKEN, ERROR_TOKEN_EXPIRED, ERROR_UNAUTHORIZED_TOKEN,
};
pub use auth::{establish_session, AuthOutcome};
pub use scrobbler::{eligible_delay, ScrobbleEngine, ScrobblePhase, ScrobbleSession, LASTFM_INTEGRATION_ID};
pub use signing::{sign, RequestParams};
