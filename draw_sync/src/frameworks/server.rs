// Framework bootstrap for the draw sync runtime.

use crate::domain::ports::{KeyValueStore, Renderer, StateChannel};
use crate::frameworks::config::{self, ChannelKind, ResetKind};
use crate::interface_adapters::channel::{BroadcastChannel, StoragePollingChannel};
use crate::interface_adapters::clients::time::{DrawHeaderClient, TimeClient};
use crate::interface_adapters::net::snapshot_serializer;
use crate::interface_adapters::render::{FanoutRenderer, LogRenderer, WatchRenderer};
use crate::interface_adapters::routes::app;
use crate::interface_adapters::state::{AppState, SystemClock};
use crate::interface_adapters::storage::{JsonFileStore, MemoryStore};
use crate::interface_adapters::utils::rng::rand_id;
use crate::use_cases::{
    CycleResetStrategy, DrawSelection, HardReload, SessionContext, SessionSettings,
    SessionSupervisor, SoftResync,
};

use axum::extract::ws::Utf8Bytes;
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::watch;
use tracing::Instrument;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state().await?;
    let app = app(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn session_settings() -> SessionSettings {
    SessionSettings {
        cycle_duration_secs: config::cycle_duration_secs(),
        upcoming_draw_count: config::upcoming_draw_count(),
        tick_interval: config::TICK_INTERVAL,
        sync_interval: config::sync_interval(),
        draw_sync_interval: config::draw_header_sync_interval(),
        broadcast_interval: config::broadcast_interval(),
        fallback_utc_offset_hours: config::fallback_utc_offset_hours(),
    }
}

async fn shared_store() -> Result<Arc<dyn KeyValueStore>> {
    match config::state_file() {
        Some(path) => {
            let store = JsonFileStore::open(&path).await.map_err(|e| {
                std::io::Error::other(format!("failed to open {}: {e}", path.display()))
            })?;
            tracing::debug!(path = %path.display(), "shared state persisted to file");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::default())),
    }
}

fn state_channel(store: Arc<dyn KeyValueStore>) -> Arc<dyn StateChannel> {
    match config::state_channel() {
        ChannelKind::Broadcast => Arc::new(BroadcastChannel::new(
            config::CHANNEL_NAME,
            config::CHANNEL_CAPACITY,
        )),
        ChannelKind::StoragePolling => Arc::new(StoragePollingChannel::new(
            config::CHANNEL_NAME,
            store,
            config::storage_poll_interval(),
            config::CHANNEL_CAPACITY,
        )),
    }
}

fn reset_strategy() -> Arc<dyn CycleResetStrategy> {
    match config::cycle_reset() {
        ResetKind::Soft => Arc::new(SoftResync),
        ResetKind::Hard => Arc::new(HardReload {
            delay: config::HARD_RELOAD_DELAY,
        }),
    }
}

// Each display keeps its own selection, like a browser tab's session storage.
fn session_selection() -> Arc<DrawSelection> {
    Arc::new(DrawSelection::new(
        Arc::new(MemoryStore::default()),
        config::auto_select_next_draw(),
        config::SELECTION_EVENTS_CAPACITY,
    ))
}

fn spawn_supervisor(ctx: SessionContext, display_index: usize) -> Arc<SessionSupervisor> {
    let supervisor = Arc::new(SessionSupervisor::new(ctx));
    tokio::spawn(
        supervisor
            .clone()
            .run(rand_id)
            .instrument(tracing::info_span!("display", display = display_index)),
    );
    supervisor
}

async fn build_state() -> Result<Arc<AppState>> {
    let time_url = config::time_sync_url();
    let header_url = config::draw_header_url();
    let timeout = config::time_sync_timeout();
    let time_client = TimeClient::new(&time_url, timeout)
        .map_err(|e| std::io::Error::other(format!("failed to initialize time client: {e}")))?;
    let header_client = DrawHeaderClient::new(&header_url, timeout).map_err(|e| {
        std::io::Error::other(format!("failed to initialize draw header client: {e}"))
    })?;
    tracing::debug!(
        time_url = %time_url,
        header_url = %header_url,
        timeout_ms = timeout.as_millis(),
        "upstream clients configured"
    );

    let shared_store = shared_store().await?;
    let channel = state_channel(shared_store.clone());
    let settings = session_settings();
    tracing::info!(
        channel = channel.name(),
        transport = ?config::state_channel(),
        reset = ?config::cycle_reset(),
        cycle_secs = settings.cycle_duration_secs,
        "display sessions configured"
    );

    // The primary display feeds the HTTP surface; extra displays only log.
    let (watch_renderer, snapshot_rx) = WatchRenderer::new();
    let primary_renderer: Arc<dyn Renderer> = Arc::new(FanoutRenderer::new(vec![
        Arc::new(watch_renderer),
        Arc::new(LogRenderer::new()),
    ]));
    let selection = session_selection();

    let base_ctx = SessionContext {
        clock: Arc::new(SystemClock),
        time_source: Arc::new(time_client),
        draw_source: Arc::new(header_client),
        shared_store,
        channel,
        renderer: primary_renderer,
        reset_strategy: reset_strategy(),
        selection: selection.clone(),
        settings,
    };

    for display in 1..config::display_sessions() {
        let ctx = SessionContext {
            renderer: Arc::new(LogRenderer::new()),
            selection: session_selection(),
            ..base_ctx.clone()
        };
        spawn_supervisor(ctx, display);
    }
    let supervisor = spawn_supervisor(base_ctx, 0);

    // Serialize frames once for all WebSocket clients.
    let (frames_tx, frames_rx) = watch::channel(Utf8Bytes::from(""));
    tokio::spawn(snapshot_serializer(snapshot_rx.clone(), frames_tx));

    Ok(Arc::new(AppState {
        supervisor,
        selection,
        snapshot_rx,
        frames_rx,
    }))
}
