// Use-case level settings and events for display sessions.

use std::time::Duration;

use crate::domain::EstimatorSettings;

/// Tuning shared by every display session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Length of one betting cycle.
    pub cycle_duration_secs: u32,
    /// Number of draws kept open for betting.
    pub upcoming_draw_count: usize,
    /// Countdown refresh cadence.
    pub tick_interval: Duration,
    /// Cadence of the authoritative time fetch.
    pub sync_interval: Duration,
    /// Cadence of the backend draw header fetch.
    pub draw_sync_interval: Duration,
    /// Cadence of full-state publishes to peers.
    pub broadcast_interval: Duration,
    pub fallback_utc_offset_hours: i32,
}

impl SessionSettings {
    pub fn estimator(&self) -> EstimatorSettings {
        EstimatorSettings {
            cycle_duration_secs: self.cycle_duration_secs,
            sync_interval: self.sync_interval,
            fallback_utc_offset_hours: self.fallback_utc_offset_hours,
        }
    }

    pub fn cycle_ms(&self) -> i64 {
        i64::from(self.cycle_duration_secs) * 1000
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cycle_duration_secs: 180,
            upcoming_draw_count: 10,
            tick_interval: Duration::from_millis(1000),
            sync_interval: Duration::from_millis(5000),
            draw_sync_interval: Duration::from_millis(5000),
            broadcast_interval: Duration::from_millis(1000),
            fallback_utc_offset_hours: -4,
        }
    }
}

/// Announced whenever the operator selection changes; `None` means cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSelected {
    pub draw_number: Option<u64>,
}

/// Why a session run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    Shutdown,
    ReloadRequested,
}
