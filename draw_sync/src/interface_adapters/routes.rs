use crate::interface_adapters::net::{
    clear_selected_draw_handler, force_sync_handler, get_selected_draw_handler, health_handler,
    set_selected_draw_handler, state_handler, ws_handler,
};
use crate::interface_adapters::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/state", get(state_handler))
        .route("/ws", get(ws_handler))
        .route(
            "/selected-draw",
            get(get_selected_draw_handler)
                .post(set_selected_draw_handler)
                .delete(clear_selected_draw_handler),
        )
        .route("/sync", post(force_sync_handler))
        .with_state(state)
}
