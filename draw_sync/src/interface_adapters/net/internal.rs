use crate::domain::errors::SelectionError;
use crate::interface_adapters::http::error_response;
use crate::interface_adapters::protocol::DisplaySnapshotDto;
use crate::interface_adapters::state::AppState;
use crate::use_cases::DisplaySession;

use axum::{
    extract::{Json, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, serde::Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, serde::Deserialize)]
pub struct SelectedDrawRequest {
    // Signed so that non-positive input reaches validation instead of failing to parse.
    draw_number: i64,
}

#[derive(Debug, serde::Serialize)]
struct SelectedDrawResponse {
    // Stored operator selection.
    draw_number: Option<u64>,
    // Draw a new slip would be stamped with right now.
    effective_draw: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
struct ClearedResponse {
    cleared: bool,
}

#[derive(Debug, serde::Serialize)]
struct SyncResponse {
    synced: bool,
    remaining_seconds: u32,
}

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

pub async fn state_handler(State(state): State<Arc<AppState>>) -> Response {
    // Clone out of the watch so the borrow is not held while responding.
    let latest = state.snapshot_rx.borrow().clone();
    match latest {
        Some(snapshot) => Json(DisplaySnapshotDto::from(&snapshot)).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "no frame rendered yet"),
    }
}

pub async fn get_selected_draw_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(session) = live_session(&state).await else {
        return session_unavailable();
    };
    let draws = session.draws().await;

    // Resolve the effective draw first; it clears a selection that is already in the past.
    let effective_draw = match state.selection.draw_for_new_slip(&draws).await {
        Ok(draw) => draw,
        Err(err) => return selection_error(err),
    };
    let draw_number = match state.selection.get().await {
        Ok(draw) => draw,
        Err(err) => return selection_error(err),
    };

    Json(SelectedDrawResponse {
        draw_number,
        effective_draw,
    })
    .into_response()
}

pub async fn set_selected_draw_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SelectedDrawRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };
    let Some(session) = live_session(&state).await else {
        return session_unavailable();
    };
    let draws = session.draws().await;

    match state.selection.set(payload.draw_number, &draws).await {
        Ok(draw_number) => {
            // Show the selection now rather than on the next tick.
            session.redraw().await;
            Json(SelectedDrawResponse {
                draw_number: Some(draw_number),
                effective_draw: Some(draw_number),
            })
            .into_response()
        }
        Err(err) => selection_error(err),
    }
}

pub async fn clear_selected_draw_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.selection.clear().await {
        Ok(cleared) => {
            if cleared && let Some(session) = live_session(&state).await {
                session.redraw().await;
            }
            Json(ClearedResponse { cleared }).into_response()
        }
        Err(err) => selection_error(err),
    }
}

pub async fn force_sync_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(session) = live_session(&state).await else {
        return session_unavailable();
    };

    let synced = session.force_sync().await;
    let remaining_seconds = session.snapshot().await.remaining_seconds;
    info!(synced, remaining_seconds, "forced resync");
    Json(SyncResponse {
        synced,
        remaining_seconds,
    })
    .into_response()
}

async fn live_session(state: &AppState) -> Option<Arc<DisplaySession>> {
    state.supervisor.current().await
}

fn session_unavailable() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "display session is not running",
    )
}

fn selection_error(err: SelectionError) -> Response {
    match err {
        SelectionError::NotPositive | SelectionError::AlreadyCompleted { .. } => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        SelectionError::Store(_) => {
            warn!(error = %err, "selection storage failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
