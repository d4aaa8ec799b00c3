use std::error::Error;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ytmd_bridge::bridge::stdio::{run_bridge_reader, run_view_writer, SharedVolume};
use ytmd_bridge::bridge::{ingress_channel, view_channel};
use ytmd_bridge::config::SettingsStore;
use ytmd_bridge::init_app_dirs;
use ytmd_bridge::integrations::{IntegrationContext, IntegrationRegistry, ResumeIntegration};
use ytmd_bridge::lastfm::{LastFmClient, ScrobbleEngine};
use ytmd_bridge::player::{run_pipeline, PlayerStateStore};
use ytmd_bridge::remote::RemoteCommandDispatcher;
use ytmd_bridge::shell::ConsoleOpener;
use ytmd_bridge::ui::Cli;

const LOG_TARGET: &str = "ytmd_bridge::main";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ytmd_bridge=info"));
    // Stdout carries bridge traffic, so logs go to stderr.
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::new();
    init_tracing(cli.args.log_json);

    init_app_dirs()?;

    let config_path = cli.config_path();
    info!(target: LOG_TARGET, "Using config at {}", config_path.display());
    let settings = Arc::new(SettingsStore::open(&config_path)?);
    if let Err(e) = settings.update(|s| cli.apply_overrides(s)) {
        cli.display_error(&e);
        return Err(e.into());
    }
    let current = settings.get();
    if let Err(e) = current.validate() {
        cli.display_error(&e);
        return Err(e.into());
    }

    let capacity = cli.args.channel_capacity.max(1);
    let (ingress, mut events) = ingress_channel(capacity);
    let (view, view_requests) = view_channel(capacity);
    let volume: SharedVolume = Arc::new(AtomicU8::new(100));
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    let mut store = PlayerStateStore::new();
    let context = IntegrationContext {
        state: store.handle(),
        view: view.clone(),
        settings: settings.clone(),
        shell: Arc::new(ConsoleOpener),
    };

    let registry = Arc::new(IntegrationRegistry::new(context));
    let client = LastFmClient::new(
        &current.scrobble.api_url,
        &current.scrobble.auth_url,
        Duration::from_secs(current.scrobble.request_timeout_secs),
    );
    registry.register(Box::new(ScrobbleEngine::new(Arc::new(client))))?;
    registry.register(Box::new(ResumeIntegration::new()))?;
    store.subscribe(registry.clone());
    registry.apply_settings(&current);

    let writer_handle = tokio::spawn({
        let volume = volume.clone();
        async move {
            if let Err(e) = run_view_writer(tokio::io::stdout(), view_requests, volume).await {
                error!(target: LOG_TARGET, "View writer failed: {}", e);
            }
        }
    });

    let reader_handle = tokio::spawn({
        let dispatcher = RemoteCommandDispatcher::new(view);
        async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = run_bridge_reader(stdin, ingress, dispatcher, volume).await {
                error!(target: LOG_TARGET, "Bridge reader failed: {}", e);
            }
        }
    });

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(target: LOG_TARGET, "Could not listen for Ctrl+C: {}", e);
            return;
        }
        info!(target: LOG_TARGET, "Ctrl+C received, shutting down.");
        let _ = shutdown_tx.send(());
    });

    let applied = run_pipeline(&mut store, &mut events, &mut shutdown_rx).await;
    info!(target: LOG_TARGET, "Applied {} state change(s).", applied);

    registry.disable_all();
    reader_handle.abort();
    // Writer ends once the last view handle is gone; the registry context holds one.
    drop(store);
    drop(registry);
    if tokio::time::timeout(Duration::from_secs(1), writer_handle).await.is_err() {
        warn!(target: LOG_TARGET, "View writer did not stop in time.");
    }
    Ok(())
}
