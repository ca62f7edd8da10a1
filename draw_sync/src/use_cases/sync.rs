use tracing::{debug, warn};

use crate::domain::errors::SyncError;
use crate::domain::ports::{Clock, DrawSource, TimeSource};
use crate::domain::{DrawHeader, ServerTimeSample};

/// Result of one time-sync attempt. Failures are not fatal; callers keep
/// counting on the local clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced {
        sample: ServerTimeSample,
        /// Local clock when the response arrived.
        received_at_ms: i64,
    },
    Fallback {
        reason: SyncError,
    },
}

// Time sync use case with injected dependencies.
pub struct TimeSyncUseCase<'a> {
    pub time_source: &'a dyn TimeSource,
    pub clock: &'a dyn Clock,
}

impl TimeSyncUseCase<'_> {
    pub async fn execute(&self) -> SyncOutcome {
        match self.time_source.fetch_time().await {
            Ok(sample) => {
                let received_at_ms = self.clock.now_epoch_millis();
                debug!(
                    server_timestamp = sample.timestamp_secs,
                    seconds_remaining = sample.seconds_remaining,
                    "time sync succeeded"
                );
                SyncOutcome::Synced {
                    sample,
                    received_at_ms,
                }
            }
            Err(reason) => {
                warn!(error = %reason, "time sync failed; using local clock");
                SyncOutcome::Fallback { reason }
            }
        }
    }
}

// Draw header sync use case. The backend is authoritative for the base draw.
pub struct DrawHeaderSyncUseCase<'a> {
    pub draw_source: &'a dyn DrawSource,
}

impl DrawHeaderSyncUseCase<'_> {
    pub async fn execute(&self) -> Option<DrawHeader> {
        match self.draw_source.fetch_draw_header().await {
            Ok(header) => Some(header),
            Err(err) => {
                warn!(error = %err, "draw header sync failed; keeping local draw numbers");
                None
            }
        }
    }
}
