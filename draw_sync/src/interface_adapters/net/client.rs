use crate::domain::DisplaySnapshot;
use crate::interface_adapters::protocol::{DisplaySnapshotDto, ServerMessage};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::rand_id;
use crate::use_cases::DrawSelected;

use axum::{
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
}

pub async fn snapshot_serializer(
    mut snapshot_rx: watch::Receiver<Option<DisplaySnapshot>>,
    frames_tx: watch::Sender<Utf8Bytes>,
) {
    // Serialize each frame once and share the bytes with every socket.
    while snapshot_rx.changed().await.is_ok() {
        let Some(snapshot) = snapshot_rx.borrow_and_update().clone() else {
            continue;
        };
        let msg = ServerMessage::TimerUpdate(DisplaySnapshotDto::from(&snapshot));
        match serde_json::to_string(&msg) {
            Ok(txt) => {
                frames_tx.send_replace(Utf8Bytes::from(txt));
            }
            Err(e) => {
                error!(error = ?e, "failed to serialize display frame");
            }
        }
    }
    debug!("display frames closed; serializer exiting");
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Subscribe before the upgrade so no selection change falls in between.
    let frames_rx = state.frames_rx.clone();
    let selections = state.selection.subscribe();
    ws.on_upgrade(move |socket| {
        let conn_id = rand_id();
        handle_socket(socket, frames_rx, selections).instrument(info_span!("conn", conn_id))
    })
}

struct ConnStats {
    msgs_out: u64,
    bytes_out: u64,
}

async fn handle_socket(
    mut socket: WebSocket,
    mut frames_rx: watch::Receiver<Utf8Bytes>,
    mut selections: broadcast::Receiver<DrawSelected>,
) {
    info!("display client connected");
    let mut stats = ConnStats {
        msgs_out: 0,
        bytes_out: 0,
    };

    if let Err(e) = run_client_loop(&mut socket, &mut frames_rx, &mut selections, &mut stats).await
    {
        warn!(error = ?e, "client loop exited with error");
    }

    info!(
        msgs_out = stats.msgs_out,
        bytes_out = stats.bytes_out,
        "display client disconnected"
    );
}

async fn run_client_loop(
    socket: &mut WebSocket,
    frames_rx: &mut watch::Receiver<Utf8Bytes>,
    selections: &mut broadcast::Receiver<DrawSelected>,
    stats: &mut ConnStats,
) -> Result<(), NetError> {
    // New clients get the current frame without waiting for the next tick.
    let latest = frames_rx.borrow_and_update().clone();
    if !latest.as_str().is_empty() {
        send_frame(socket, latest, stats).await?;
    }

    loop {
        tokio::select! {
            changed = frames_rx.changed() => {
                if changed.is_err() {
                    debug!("frame source closed");
                    return Ok(());
                }
                let frame = frames_rx.borrow_and_update().clone();
                send_frame(socket, frame, stats).await?;
            }
            selected = selections.recv() => match selected {
                Ok(DrawSelected { draw_number }) => {
                    let msg = ServerMessage::DrawSelected { draw_number };
                    let txt = serde_json::to_string(&msg).map_err(NetError::Serialization)?;
                    send_frame(socket, Utf8Bytes::from(txt), stats).await?;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Only the latest selection matters; the next frame carries it too.
                    warn!(missed = n, "selection events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            incoming = socket.recv() => match incoming {
                None | Some(Ok(Message::Close(_))) => return Ok(()),
                Some(Err(e)) => return Err(NetError::Ws(e)),
                // Display clients are read-only; anything they send is ignored.
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_frame(
    socket: &mut WebSocket,
    frame: Utf8Bytes,
    stats: &mut ConnStats,
) -> Result<(), NetError> {
    let bytes = frame.as_str().len() as u64;
    socket
        .send(Message::Text(frame))
        .await
        .map_err(NetError::Ws)?;
    stats.msgs_out += 1;
    stats.bytes_out += bytes;
    Ok(())
}
