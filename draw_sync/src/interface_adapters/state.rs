use crate::domain::DisplaySnapshot;
use crate::domain::ports::Clock;
use crate::use_cases::{DrawSelection, SessionSupervisor};
use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    // Owner of the display session the HTTP surface reports on.
    pub supervisor: Arc<SessionSupervisor>,
    // Operator draw selection, shared with the session.
    pub selection: Arc<DrawSelection>,
    // Latest rendered frame.
    pub snapshot_rx: watch::Receiver<Option<DisplaySnapshot>>,
    // Latest frame serialized once for every WebSocket client.
    pub frames_rx: watch::Receiver<Utf8Bytes>,
}

// System clock adapter used by display sessions.
#[derive(Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_millis(&self) -> i64 {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        i64::try_from(millis).unwrap_or(i64::MAX)
    }
}
