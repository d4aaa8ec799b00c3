//! The scrobble engine: now-playing updates, delayed scrobbles and session upkeep.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::api::{ApiCredentials, LastFmError, ScrobbleApi};
use super::auth::{establish_session, AuthOutcome};
use crate::config::{LastFmSettings, SettingsNamespace, SettingsStore};
use crate::integrations::{Integration, IntegrationContext, IntegrationError};
use crate::player::{NormalizedPlaybackState, StateDelta, Track};
use crate::shell::ExternalOpener;

const LOG_TARGET: &str = "ytmd_bridge::lastfm::scrobbler";

pub const LASTFM_INTEGRATION_ID: &str = "last-fm";

/// `min(round(duration / 2), cap)`; halves round up.
pub fn eligible_delay(duration_seconds: u64, cap: Duration) -> Duration {
    Duration::from_secs(duration_seconds.saturating_add(1) / 2).min(cap)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrobblePhase {
    Disabled,
    Idle,
    Tracking(Track),
    Armed { track: Track, fire_at: Instant },
}

/// Account link with the scrobble provider, mirrored from the `lastfm` settings section.
#[derive(Clone, Default, PartialEq)]
pub struct ScrobbleSession {
    pub api_key: String,
    pub shared_secret: String,
    pub session_key: Option<String>,
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for ScrobbleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrobbleSession")
            .field("api_key", &self.api_key)
            .field("has_session_key", &self.session_key.is_some())
            .field("auth_token", &self.auth_token)
            .finish()
    }
}

impl ScrobbleSession {
    pub fn from_settings(lastfm: &LastFmSettings) -> Self {
        Self {
            api_key: lastfm.api_key.clone(),
            shared_secret: lastfm.secret.clone(),
            session_key: lastfm.session_key.clone().filter(|k| !k.is_empty()),
            auth_token: lastfm.token.clone().filter(|t| !t.is_empty()),
        }
    }

    pub fn credentials(&self) -> Option<ApiCredentials> {
        if self.api_key.is_empty() || self.shared_secret.is_empty() {
            return None;
        }
        Some(ApiCredentials {
            api_key: self.api_key.clone(),
            shared_secret: self.shared_secret.clone(),
        })
    }

    pub fn has_session_key(&self) -> bool {
        self.session_key.is_some()
    }
}

/// The single armed scrobble. Only the timer whose generation matches may fire it.
struct PendingScrobble {
    track: Track,
    armed_at: DateTime<Utc>,
    fire_at: Instant,
    generation: u64,
    timer: JoinHandle<()>,
}

struct EngineState {
    phase: ScrobblePhase,
    last_tracked: Option<Track>,
    pending: Option<PendingScrobble>,
    session: ScrobbleSession,
    auth_in_flight: bool,
    next_generation: u64,
}

struct EngineDeps {
    settings: Arc<SettingsStore>,
    shell: Arc<dyn ExternalOpener>,
    max_delay: Duration,
}

enum Submission {
    NowPlaying(Track),
    Scrobble { track: Track, timestamp: i64 },
}

struct EngineShared {
    api: Arc<dyn ScrobbleApi>,
    state: Mutex<EngineState>,
    deps: OnceLock<EngineDeps>,
}

impl EngineShared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Persists a change to the `lastfm` section. Never call with the state lock held:
    /// the settings listener takes it.
    fn persist<F>(&self, mutate: F)
    where
        F: FnOnce(&mut LastFmSettings),
    {
        let Some(deps) = self.deps.get() else {
            return;
        };
        if let Err(e) = deps.settings.update(|settings| mutate(&mut settings.lastfm)) {
            error!(target: LOG_TARGET, "Failed to persist Last.fm session: {}", e);
        }
    }
}

/// Last.fm scrobbling as an integration.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct ScrobbleEngine {
    shared: Arc<EngineShared>,
}

impl ScrobbleEngine {
    pub fn new(api: Arc<dyn ScrobbleApi>) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                api,
                state: Mutex::new(EngineState {
                    phase: ScrobblePhase::Disabled,
                    last_tracked: None,
                    pending: None,
                    session: ScrobbleSession::default(),
                    auth_in_flight: false,
                    next_generation: 0,
                }),
                deps: OnceLock::new(),
            }),
        }
    }

    pub fn phase(&self) -> ScrobblePhase {
        self.shared.lock().phase.clone()
    }

    pub fn session(&self) -> ScrobbleSession {
        self.shared.lock().session.clone()
    }

    fn cancel_pending(state: &mut EngineState) {
        if let Some(pending) = state.pending.take() {
            pending.timer.abort();
            let remaining = pending.fire_at.saturating_duration_since(Instant::now());
            debug!(target: LOG_TARGET, "Cancelled pending scrobble of {} ({:?} early)", pending.track, remaining);
        }
    }

    fn arm(shared: &Arc<EngineShared>, state: &mut EngineState, track: Track, max_delay: Duration) {
        let delay = eligible_delay(track.duration_seconds, max_delay);
        let fire_at = Instant::now() + delay;
        let generation = state.next_generation;
        state.next_generation += 1;

        let weak: Weak<EngineShared> = Arc::downgrade(shared);
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            if let Some(shared) = weak.upgrade() {
                ScrobbleEngine::fire(&shared, generation);
            }
        });

        debug!(target: LOG_TARGET, "Armed scrobble of {} in {:?}", track, delay);
        state.pending = Some(PendingScrobble {
            track: track.clone(),
            armed_at: Utc::now(),
            fire_at,
            generation,
            timer,
        });
        state.phase = ScrobblePhase::Armed { track, fire_at };
    }

    fn fire(shared: &Arc<EngineShared>, generation: u64) {
        let pending = {
            let mut state = shared.lock();
            match &state.pending {
                Some(p) if p.generation == generation => {}
                _ => return,
            }
            state.phase = ScrobblePhase::Idle;
            state.pending.take()
        };
        if let Some(pending) = pending {
            let submission = Submission::Scrobble {
                timestamp: pending.armed_at.timestamp(),
                track: pending.track,
            };
            tokio::spawn(Self::submit(shared.clone(), submission));
        }
    }

    /// One attempt per call; failures are logged and dropped.
    #[instrument(skip_all)]
    async fn submit(shared: Arc<EngineShared>, submission: Submission) {
        let (credentials, session_key) = {
            let state = shared.lock();
            (state.session.credentials(), state.session.session_key.clone())
        };
        let Some(credentials) = credentials else {
            warn!(target: LOG_TARGET, "Last.fm credentials missing, dropping submission.");
            return;
        };
        let Some(session_key) = session_key else {
            debug!(target: LOG_TARGET, "No session key yet, dropping submission.");
            Self::start_auth(&shared);
            return;
        };

        let result = match &submission {
            Submission::NowPlaying(track) => {
                shared.api.update_now_playing(&credentials, &session_key, track).await
            }
            Submission::Scrobble { track, timestamp } => {
                shared
                    .api
                    .scrobble(&credentials, &session_key, track, *timestamp)
                    .await
            }
        };

        match (result, &submission) {
            (Ok(()), Submission::NowPlaying(track)) => {
                debug!(target: LOG_TARGET, "Now playing: {}", track)
            }
            (Ok(()), Submission::Scrobble { track, .. }) => {
                info!(target: LOG_TARGET, "Scrobbled {}", track)
            }
            (Err(e), _) if e.is_invalid_session() => {
                warn!(target: LOG_TARGET, "Last.fm session rejected, re-authenticating.");
                Self::invalidate_session(&shared, &session_key);
                Self::start_auth(&shared);
            }
            (Err(e), _) => warn!(target: LOG_TARGET, "Last.fm call failed: {}", e),
        }
    }

    fn invalidate_session(shared: &Arc<EngineShared>, rejected: &str) {
        {
            let mut state = shared.lock();
            if state.session.session_key.as_deref() == Some(rejected) {
                state.session.session_key = None;
            }
        }
        shared.persist(|lastfm| {
            if lastfm.session_key.as_deref() == Some(rejected) {
                lastfm.session_key = None;
            }
        });
    }

    /// Starts the auth flow in the background unless one is already running.
    fn start_auth(shared: &Arc<EngineShared>) {
        let (credentials, stored_token) = {
            let mut state = shared.lock();
            if state.auth_in_flight || state.phase == ScrobblePhase::Disabled {
                return;
            }
            let Some(credentials) = state.session.credentials() else {
                warn!(target: LOG_TARGET, "Cannot authenticate without an API key and secret.");
                return;
            };
            state.auth_in_flight = true;
            (credentials, state.session.auth_token.clone())
        };

        let shared = shared.clone();
        tokio::spawn(async move {
            if let Some(deps) = shared.deps.get() {
                let outcome = establish_session(
                    shared.api.as_ref(),
                    deps.shell.as_ref(),
                    &credentials,
                    stored_token.as_deref(),
                )
                .await;
                Self::finish_auth(&shared, outcome);
            }
            shared.lock().auth_in_flight = false;
        });
    }

    fn finish_auth(shared: &Arc<EngineShared>, outcome: Result<AuthOutcome, LastFmError>) {
        match outcome {
            Ok(AuthOutcome::SessionEstablished(session_key)) => {
                {
                    let mut state = shared.lock();
                    state.session.session_key = Some(session_key.clone());
                    state.session.auth_token = None;
                }
                shared.persist(move |lastfm| {
                    lastfm.session_key = Some(session_key);
                    lastfm.token = None;
                });
            }
            Ok(AuthOutcome::AwaitingApproval { token }) => {
                shared.lock().session.auth_token = Some(token.clone());
                shared.persist(move |lastfm| lastfm.token = Some(token));
            }
            Err(e) => warn!(target: LOG_TARGET, "Last.fm authentication failed: {}", e),
        }
    }
}

impl Integration for ScrobbleEngine {
    fn id(&self) -> &'static str {
        LASTFM_INTEGRATION_ID
    }

    fn provide(&mut self, context: IntegrationContext) {
        if self.shared.deps.get().is_some() {
            warn!(target: LOG_TARGET, "Scrobble engine was provided twice; keeping the first context.");
            return;
        }
        let max_delay = Duration::from_secs(context.settings.get().scrobble.max_eligible_delay_secs);

        let weak = Arc::downgrade(&self.shared);
        context
            .settings
            .subscribe(SettingsNamespace::LastFm, move |_old, new| {
                if let Some(shared) = weak.upgrade() {
                    shared.lock().session = ScrobbleSession::from_settings(&new.lastfm);
                }
            });

        let deps = EngineDeps {
            settings: context.settings,
            shell: context.shell,
            max_delay,
        };
        if self.shared.deps.set(deps).is_err() {
            warn!(target: LOG_TARGET, "Scrobble engine context was set concurrently; keeping the first one.");
        }
    }

    fn enable(&mut self) -> Result<(), IntegrationError> {
        let deps = self.shared.deps.get().ok_or(IntegrationError::NotProvided)?;
        let session = ScrobbleSession::from_settings(&deps.settings.get().lastfm);

        let needs_auth = {
            let mut state = self.shared.lock();
            if state.phase != ScrobblePhase::Disabled {
                return Ok(());
            }
            state.phase = ScrobblePhase::Idle;
            state.session = session;
            if state.session.credentials().is_none() {
                warn!(target: LOG_TARGET, "Last.fm API key or secret missing; nothing will be scrobbled.");
                false
            } else {
                !state.session.has_session_key()
            }
        };

        if needs_auth {
            Self::start_auth(&self.shared);
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<(), IntegrationError> {
        let mut state = self.shared.lock();
        Self::cancel_pending(&mut state);
        state.phase = ScrobblePhase::Disabled;
        state.last_tracked = None;
        Ok(())
    }

    fn on_state_changed(
        &mut self,
        _previous: &NormalizedPlaybackState,
        current: &NormalizedPlaybackState,
        _delta: &StateDelta,
    ) -> Result<(), IntegrationError> {
        if !current.is_playing() {
            return Ok(());
        }
        let Some(track) = current.current_track.as_ref() else {
            return Ok(());
        };
        let deps = self.shared.deps.get().ok_or(IntegrationError::NotProvided)?;

        {
            let mut state = self.shared.lock();
            if state.phase == ScrobblePhase::Disabled {
                return Ok(());
            }
            if state.last_tracked.as_ref() == Some(track) {
                return Ok(());
            }
            Self::cancel_pending(&mut state);
            state.last_tracked = Some(track.clone());
            state.phase = ScrobblePhase::Tracking(track.clone());
            Self::arm(&self.shared, &mut state, track.clone(), deps.max_delay);
        }

        tokio::spawn(Self::submit(
            self.shared.clone(),
            Submission::NowPlaying(track.clone()),
        ));
        Ok(())
    }
}
