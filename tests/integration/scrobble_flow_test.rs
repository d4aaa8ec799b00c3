//! End-to-end scrobble timing through the real pipeline
//!
//! Time is paused, so the scrobble delays are exercised without waiting for them.

use crate::test_utils::{linked_settings, state_line, video_data_line, RecordingOpener};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use ytmd_bridge::bridge::{decode_message, ingress_channel, parse_line, view_channel, BridgeMessage, IngressSender};
use ytmd_bridge::config::SettingsStore;
use ytmd_bridge::integrations::{IntegrationContext, IntegrationRegistry};
use ytmd_bridge::lastfm::{
    ApiCredentials, LastFmError, ScrobbleApi, ScrobbleEngine, ERROR_INVALID_SESSION_KEY,
    LASTFM_INTEGRATION_ID,
};
use ytmd_bridge::player::{run_pipeline, PlayerStateStore, Track};

#[derive(Default)]
struct ProviderLog {
    now_playing: Mutex<Vec<String>>,
    scrobbles: Mutex<Vec<(String, Option<String>)>>,
    tokens_issued: Mutex<usize>,
    reject_session: Mutex<bool>,
}

#[async_trait]
impl ScrobbleApi for ProviderLog {
    async fn get_token(&self, _credentials: &ApiCredentials) -> Result<String, LastFmError> {
        let mut issued = self.tokens_issued.lock().unwrap();
        *issued += 1;
        Ok(format!("token-{}", *issued))
    }

    async fn get_session(&self, _credentials: &ApiCredentials, _token: &str) -> Result<String, LastFmError> {
        Ok("renewed-session".to_string())
    }

    async fn update_now_playing(
        &self,
        _credentials: &ApiCredentials,
        _session_key: &str,
        track: &Track,
    ) -> Result<(), LastFmError> {
        self.now_playing.lock().unwrap().push(track.video_id.clone());
        Ok(())
    }

    async fn scrobble(
        &self,
        _credentials: &ApiCredentials,
        _session_key: &str,
        track: &Track,
        _timestamp: i64,
    ) -> Result<(), LastFmError> {
        if *self.reject_session.lock().unwrap() {
            return Err(LastFmError::Api {
                code: ERROR_INVALID_SESSION_KEY,
                message: "Invalid session key".to_string(),
            });
        }
        self.scrobbles
            .lock()
            .unwrap()
            .push((track.video_id.clone(), track.album.clone()));
        Ok(())
    }

    fn authorization_url(&self, api_key: &str, token: &str) -> String {
        format!("https://provider.test/auth?api_key={}&token={}", api_key, token)
    }
}

struct Rig {
    ingress: IngressSender,
    provider: Arc<ProviderLog>,
    opener: Arc<RecordingOpener>,
    settings: Arc<SettingsStore>,
    shutdown: broadcast::Sender<()>,
    pipeline: tokio::task::JoinHandle<usize>,
}

fn start_rig() -> Rig {
    let provider = Arc::new(ProviderLog::default());
    let opener = Arc::new(RecordingOpener::default());
    let settings = Arc::new(SettingsStore::in_memory(linked_settings()));

    let mut store = PlayerStateStore::new();
    let (view, _view_requests) = view_channel(8);
    let registry = Arc::new(IntegrationRegistry::new(IntegrationContext {
        state: store.handle(),
        view,
        settings: settings.clone(),
        shell: opener.clone(),
    }));
    registry
        .register(Box::new(ScrobbleEngine::new(provider.clone())))
        .unwrap();
    registry.apply_settings(&settings.get());
    assert!(registry.is_enabled(LASTFM_INTEGRATION_ID));
    store.subscribe(registry);

    let (ingress, mut events) = ingress_channel(64);
    let (shutdown, mut shutdown_rx) = broadcast::channel(1);
    let pipeline = tokio::spawn(async move { run_pipeline(&mut store, &mut events, &mut shutdown_rx).await });

    Rig {
        ingress,
        provider,
        opener,
        settings,
        shutdown,
        pipeline,
    }
}

async fn feed(ingress: &IngressSender, line: &str) {
    let envelope = parse_line(line).unwrap();
    if let Some(BridgeMessage::Playback(event)) = decode_message(&envelope).unwrap() {
        ingress.send(event).await.unwrap();
    }
    // Give the pipeline and any spawned network calls a chance to run
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[cfg(test)]
mod scrobble_flow_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_superseded_track_is_never_scrobbled() {
        let rig = start_rig();

        // t = 0: A (300s) starts playing, armed for t = 150s
        feed(&rig.ingress, &video_data_line("A", 300, None)).await;
        feed(&rig.ingress, &state_line(1)).await;
        assert_eq!(*rig.provider.now_playing.lock().unwrap(), vec!["A"]);

        // t = 100s: B (200s) replaces it, armed for t = 200s
        tokio::time::sleep(Duration::from_secs(100)).await;
        feed(&rig.ingress, &video_data_line("B", 200, None)).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rig.provider.scrobbles.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(
            *rig.provider.scrobbles.lock().unwrap(),
            vec![("B".to_string(), Some("Test Album".to_string()))]
        );
        assert_eq!(*rig.provider.now_playing.lock().unwrap(), vec!["A", "B"]);

        rig.shutdown.send(()).unwrap();
        let applied = rig.pipeline.await.unwrap();
        assert_eq!(applied, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_track_is_not_announced_until_playing() {
        let rig = start_rig();

        feed(&rig.ingress, &video_data_line("A", 120, None)).await;
        feed(&rig.ingress, &state_line(2)).await;
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(rig.provider.now_playing.lock().unwrap().is_empty());

        feed(&rig.ingress, &state_line(1)).await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(*rig.provider.now_playing.lock().unwrap(), vec!["A"]);
        assert_eq!(rig.provider.scrobbles.lock().unwrap().len(), 1);

        drop(rig.ingress);
        rig.pipeline.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_session_reauthenticates_once() {
        let rig = start_rig();
        *rig.provider.reject_session.lock().unwrap() = true;

        feed(&rig.ingress, &video_data_line("A", 20, None)).await;
        feed(&rig.ingress, &state_line(1)).await;
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert!(rig.provider.scrobbles.lock().unwrap().is_empty());
        assert_eq!(*rig.provider.tokens_issued.lock().unwrap(), 1);
        assert_eq!(
            *rig.opener.opened.lock().unwrap(),
            vec!["https://provider.test/auth?api_key=integration-key&token=token-1"]
        );
        let lastfm = rig.settings.get().lastfm;
        assert_eq!(lastfm.session_key, None);
        assert_eq!(lastfm.token.as_deref(), Some("token-1"));

        // The pipeline keeps running
        feed(&rig.ingress, &state_line(2)).await;
        rig.shutdown.send(()).unwrap();
        assert_eq!(rig.pipeline.await.unwrap(), 3);
    }
}
