// Renderer adapters. The HTTP surface reads the watch slot; the log renderer mirrors
// the cashier console.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::ports::Renderer;
use crate::domain::{DisplaySnapshot, Urgency};

const NOTHING_LOGGED: u32 = u32::MAX;
const QUIET_LOG_EVERY_SECS: u32 = 30;

/// Logs the countdown every second near the draw and every 30 s otherwise.
pub struct LogRenderer {
    last_logged: AtomicU32,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self {
            last_logged: AtomicU32::new(NOTHING_LOGGED),
        }
    }

    fn should_log(&self, remaining_seconds: u32) -> bool {
        let due = remaining_seconds % QUIET_LOG_EVERY_SECS == 0
            || Urgency::for_remaining(remaining_seconds) == Urgency::Critical;
        // Several frames can land on the same second.
        due && self.last_logged.swap(remaining_seconds, Ordering::Relaxed) != remaining_seconds
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for LogRenderer {
    fn render(&self, snapshot: &DisplaySnapshot) {
        if !self.should_log(snapshot.remaining_seconds) {
            return;
        }
        info!(
            session_id = snapshot.session_id,
            countdown = %snapshot.display,
            urgency = ?snapshot.urgency,
            sync = ?snapshot.sync_health,
            current_draw = snapshot.current_draw_number,
            next_draw = snapshot.next_draw_number,
            selected_draw = ?snapshot.selected_draw,
            "countdown"
        );
    }
}

/// Publishes the latest frame into a watch slot.
pub struct WatchRenderer {
    tx: watch::Sender<Option<DisplaySnapshot>>,
}

impl WatchRenderer {
    pub fn new() -> (Self, watch::Receiver<Option<DisplaySnapshot>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl Renderer for WatchRenderer {
    fn render(&self, snapshot: &DisplaySnapshot) {
        if self.tx.send(Some(snapshot.clone())).is_err() {
            debug!(session_id = snapshot.session_id, "no render target attached");
        }
    }
}

/// Hands every frame to each inner renderer in order.
pub struct FanoutRenderer {
    targets: Vec<Arc<dyn Renderer>>,
}

impl FanoutRenderer {
    pub fn new(targets: Vec<Arc<dyn Renderer>>) -> Self {
        Self { targets }
    }
}

impl Renderer for FanoutRenderer {
    fn render(&self, snapshot: &DisplaySnapshot) {
        for target in &self.targets {
            target.render(snapshot);
        }
    }
}
