// Cycle-reset strategies run once per cycle boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{Instrument, info};

use crate::use_cases::session::DisplaySession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAction {
    /// The session continues with a new cycle.
    Resumed,
    /// The session must be torn down and rebuilt from storage.
    Reload,
}

#[async_trait]
pub trait CycleResetStrategy: Send + Sync {
    async fn on_cycle_end(&self, session: &Arc<DisplaySession>) -> ResetAction;
    fn name(&self) -> &'static str;
}

/// Rebuild the whole session after a short delay, like a page refresh.
pub struct HardReload {
    pub delay: Duration,
}

impl Default for HardReload {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
        }
    }
}

#[async_trait]
impl CycleResetStrategy for HardReload {
    async fn on_cycle_end(&self, session: &Arc<DisplaySession>) -> ResetAction {
        info!(
            session_id = session.id(),
            delay_ms = self.delay.as_millis() as u64,
            "cycle ended; reloading session"
        );
        tokio::time::sleep(self.delay).await;
        ResetAction::Reload
    }

    fn name(&self) -> &'static str {
        "hard"
    }
}

/// Keep the session and resync the clock in place.
pub struct SoftResync;

#[async_trait]
impl CycleResetStrategy for SoftResync {
    async fn on_cycle_end(&self, session: &Arc<DisplaySession>) -> ResetAction {
        session.finish_reset().await;
        // Detached like the periodic sync; the countdown keeps ticking until it lands.
        let session = session.clone();
        tokio::spawn(
            async move {
                session.sync_time().await;
            }
            .in_current_span(),
        );
        ResetAction::Resumed
    }

    fn name(&self) -> &'static str {
        "soft"
    }
}
