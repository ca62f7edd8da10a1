// Local clock estimation against the authoritative Georgetown time server.

use std::time::Duration;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// One successful reading from the time-sync endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTimeSample {
    /// Server clock in epoch seconds.
    pub timestamp_secs: i64,
    /// Seconds left in the running cycle as reported by the server.
    pub seconds_remaining: i64,
    /// Human-readable server time, informational only.
    pub formatted: String,
    /// Start of the next cycle as formatted by the server, if provided.
    pub next_cycle_start: Option<String>,
}

/// Tuning for the estimator.
#[derive(Debug, Clone, Copy)]
pub struct EstimatorSettings {
    /// Length of one betting cycle.
    pub cycle_duration_secs: u32,
    /// Expected cadence of server syncs; a sample older than twice this is stale.
    pub sync_interval: Duration,
    /// Fixed offset used when no fresh sample exists (Georgetown is UTC-4).
    pub fallback_utc_offset_hours: i32,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            cycle_duration_secs: 180,
            sync_interval: Duration::from_secs(5),
            fallback_utc_offset_hours: -4,
        }
    }
}

/// Age of the last server sample relative to the sync cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncHealth {
    Fresh,
    Aging,
    Stale,
}

/// Translates server samples into a local countdown and extrapolates between syncs.
#[derive(Debug, Clone)]
pub struct ClockEstimator {
    settings: EstimatorSettings,
    offset_ms: i64,
    last_sync_ms: Option<i64>,
    // Server-clock instant at which the sampled cycle ends.
    cycle_end_server_ms: Option<i64>,
}

impl ClockEstimator {
    pub fn new(settings: EstimatorSettings) -> Self {
        Self {
            settings,
            offset_ms: 0,
            last_sync_ms: None,
            cycle_end_server_ms: None,
        }
    }

    pub fn settings(&self) -> EstimatorSettings {
        self.settings
    }

    /// Server clock minus local clock, from the last sample.
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    pub fn last_sync_ms(&self) -> Option<i64> {
        self.last_sync_ms
    }

    /// Records a sample received at local time `now_ms`.
    pub fn apply_sample(&mut self, sample: &ServerTimeSample, now_ms: i64) {
        let server_ms = sample.timestamp_secs.saturating_mul(1000);
        let remaining = sample
            .seconds_remaining
            .clamp(0, i64::from(self.settings.cycle_duration_secs));

        self.offset_ms = server_ms.saturating_sub(now_ms);
        self.last_sync_ms = Some(now_ms);
        self.cycle_end_server_ms = Some(server_ms.saturating_add(remaining * 1000));
    }

    /// True while the last sample is younger than two sync intervals.
    pub fn is_synced(&self, now_ms: i64) -> bool {
        let window = 2 * self.sync_interval_ms();
        self.last_sync_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < window)
    }

    pub fn sync_health(&self, now_ms: i64) -> SyncHealth {
        let interval = self.sync_interval_ms();
        match self.last_sync_ms.map(|last| now_ms.saturating_sub(last)) {
            Some(age) if age < interval => SyncHealth::Fresh,
            Some(age) if age < 2 * interval => SyncHealth::Aging,
            _ => SyncHealth::Stale,
        }
    }

    /// Best estimate of the server clock in epoch milliseconds; the local clock until
    /// a first sample arrives.
    pub fn server_now_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_add(self.offset_ms)
    }

    /// Milliseconds until the next cycle boundary, in `(0, cycle]`.
    ///
    /// A boundary that lands exactly on `now_ms` counts as the start of a full new cycle.
    pub fn millis_until_boundary(&self, now_ms: i64) -> i64 {
        let cycle_ms = self.cycle_ms();
        let left = match self.cycle_end_server_ms {
            Some(end) if self.is_synced(now_ms) => {
                end.saturating_sub(self.server_now_ms(now_ms))
                    .rem_euclid(cycle_ms)
            }
            _ => {
                let adjusted = now_ms.saturating_add(self.fallback_offset_ms());
                cycle_ms - adjusted.rem_euclid(cycle_ms)
            }
        };

        if left == 0 { cycle_ms } else { left }
    }

    /// Whole seconds left in the running cycle, always in `[1, cycle]`.
    pub fn current_countdown(&self, now_ms: i64) -> u32 {
        let left = self.millis_until_boundary(now_ms);
        // `left` is bounded by the cycle length, which fits in u32 seconds.
        ((left + 999) / 1000) as u32
    }

    fn cycle_ms(&self) -> i64 {
        i64::from(self.settings.cycle_duration_secs.max(1)) * 1000
    }

    fn sync_interval_ms(&self) -> i64 {
        i64::try_from(self.settings.sync_interval.as_millis()).unwrap_or(i64::MAX / 4)
    }

    fn fallback_offset_ms(&self) -> i64 {
        i64::from(self.settings.fallback_utc_offset_hours) * MILLIS_PER_HOUR
    }
}
