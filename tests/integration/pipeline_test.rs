//! Integration tests for the ingress → store → registry pipeline
//!
//! Raw bridge lines go in one end; integrations observe normalized deltas at the other.

use crate::test_utils::{bridge_line, record, state_line, video_data_line, DeltaLog};
use serde_json::json;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use tokio::sync::broadcast;
use ytmd_bridge::bridge::stdio::run_bridge_reader;
use ytmd_bridge::bridge::{ingress_channel, view_channel};
use ytmd_bridge::config::{Settings, SettingsStore};
use ytmd_bridge::integrations::{
    Integration, IntegrationContext, IntegrationError, IntegrationRegistry,
};
use ytmd_bridge::player::{
    run_pipeline, NormalizedPlaybackState, PlayState, PlayerStateStore, StateDelta,
};
use ytmd_bridge::remote::RemoteCommandDispatcher;
use ytmd_bridge::shell::ConsoleOpener;

struct Recording {
    log: DeltaLog,
}

impl Integration for Recording {
    fn id(&self) -> &'static str {
        "recording"
    }

    fn provide(&mut self, _context: IntegrationContext) {}

    fn enable(&mut self) -> Result<(), IntegrationError> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), IntegrationError> {
        Ok(())
    }

    fn on_state_changed(
        &mut self,
        _previous: &NormalizedPlaybackState,
        current: &NormalizedPlaybackState,
        delta: &StateDelta,
    ) -> Result<(), IntegrationError> {
        record(&self.log, current, delta);
        Ok(())
    }
}

/// Fails on every notification, once by panicking and afterwards by returning errors.
struct Exploding {
    calls: usize,
}

impl Integration for Exploding {
    fn id(&self) -> &'static str {
        "exploding"
    }

    fn provide(&mut self, _context: IntegrationContext) {}

    fn enable(&mut self) -> Result<(), IntegrationError> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), IntegrationError> {
        Ok(())
    }

    fn on_state_changed(
        &mut self,
        _previous: &NormalizedPlaybackState,
        _current: &NormalizedPlaybackState,
        _delta: &StateDelta,
    ) -> Result<(), IntegrationError> {
        self.calls += 1;
        if self.calls == 1 {
            panic!("exploding integration");
        }
        Err(IntegrationError::Failed("still broken".to_string()))
    }
}

#[cfg(test)]
mod pipeline_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_bridge_lines_reach_integrations_in_order() {
        let input = [
            video_data_line("A", 240, Some("PL1")),
            video_data_line("A", 240, Some("PL1")),
            state_line(1),
            bridge_line("ytmView:videoProgressChanged", vec![json!(5.0)]),
            state_line(4),
            "not even json".to_string(),
            bridge_line("ytmView:futureChannel", vec![]),
            video_data_line("B", 180, None),
            bridge_line("ytmView:adStateChanged", vec![json!(true)]),
        ]
        .join("\n");

        let mut store = PlayerStateStore::new();
        let handle = store.handle();
        let (view, _view_requests) = view_channel(8);
        let context = IntegrationContext {
            state: store.handle(),
            view: view.clone(),
            settings: Arc::new(SettingsStore::in_memory(Settings::default())),
            shell: Arc::new(ConsoleOpener),
        };

        let log = DeltaLog::default();
        let registry = Arc::new(IntegrationRegistry::new(context));
        registry.register(Box::new(Exploding { calls: 0 })).unwrap();
        registry.register(Box::new(Recording { log: log.clone() })).unwrap();
        registry.enable("exploding").unwrap();
        registry.enable("recording").unwrap();
        store.subscribe(registry.clone());

        let (ingress, mut events) = ingress_channel(32);
        run_bridge_reader(
            input.as_bytes(),
            ingress,
            RemoteCommandDispatcher::new(view),
            Arc::new(AtomicU8::new(50)),
        )
        .await
        .unwrap();

        let (_shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let applied = run_pipeline(&mut store, &mut events, &mut shutdown_rx).await;
        assert_eq!(applied, 5);

        let deltas = log.lock().unwrap().clone();
        assert_eq!(deltas.len(), 5);
        assert!(matches!(&deltas[0], StateDelta::TrackChanged { previous: None, current } if current.video_id == "A"));
        assert_eq!(
            deltas[1],
            StateDelta::PlayStateChanged {
                previous: PlayState::Unstarted,
                current: PlayState::Playing
            }
        );
        assert_eq!(deltas[2], StateDelta::Progress { seconds: 5.0 });
        assert!(matches!(
            &deltas[3],
            StateDelta::TrackChanged { previous: Some(p), current } if p.video_id == "A" && current.video_id == "B"
        ));
        assert_eq!(deltas[4], StateDelta::AdStateChanged { running: true });

        let latest = handle.borrow().clone();
        assert_eq!(latest.current_track.clone().map(|t| t.video_id), Some("B".to_string()));
        assert_eq!(latest.playlist_id, None);
        assert_eq!(latest.progress_seconds, 0.0);
        assert!(latest.ad_running);
        assert!(latest.is_playing());
    }

    #[tokio::test]
    async fn test_shutdown_stops_pipeline_with_open_ingress() {
        let mut store = PlayerStateStore::new();
        let (ingress, mut events) = ingress_channel(4);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

        shutdown_tx.send(()).unwrap();
        let applied = run_pipeline(&mut store, &mut events, &mut shutdown_rx).await;
        assert_eq!(applied, 0);
        drop(ingress);
    }
}
