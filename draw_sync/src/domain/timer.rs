// Countdown state and the per-cycle reset guard.

use crate::domain::clock::ClockEstimator;

// End times closer than this are the same boundary seen through different syncs.
const BOUNDARY_TOLERANCE_MS: i64 = 1000;

/// Countdown for the running cycle, in local epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub countdown_end_epoch_ms: i64,
    /// Always `max(0, floor((countdown_end_epoch_ms - now) / 1000))` as of the last refresh.
    pub remaining_seconds: u32,
    pub draw_interval_secs: u32,
    pub server_time_offset_ms: i64,
    pub last_server_sync_epoch_ms: Option<i64>,
}

impl TimerState {
    /// Builds a timer whose end is the next boundary the estimator knows about.
    pub fn aligned(estimator: &ClockEstimator, now_ms: i64) -> Self {
        let mut state = Self {
            countdown_end_epoch_ms: now_ms,
            remaining_seconds: 0,
            draw_interval_secs: estimator.settings().cycle_duration_secs,
            server_time_offset_ms: 0,
            last_server_sync_epoch_ms: None,
        };
        state.align(estimator, now_ms);
        state
    }

    pub fn remaining_at(&self, now_ms: i64) -> u32 {
        let left = (self.countdown_end_epoch_ms - now_ms).max(0) / 1000;
        left.min(i64::from(self.draw_interval_secs)) as u32
    }

    /// Recomputes `remaining_seconds` for `now_ms` and returns it.
    pub fn refresh(&mut self, now_ms: i64) -> u32 {
        self.remaining_seconds = self.remaining_at(now_ms);
        self.remaining_seconds
    }

    /// Moves the end to the estimator's next boundary.
    pub fn align(&mut self, estimator: &ClockEstimator, now_ms: i64) {
        self.countdown_end_epoch_ms = now_ms + estimator.millis_until_boundary(now_ms);
        self.server_time_offset_ms = estimator.offset_ms();
        self.last_server_sync_epoch_ms = estimator.last_sync_ms();
        self.refresh(now_ms);
    }

    /// Starts a full cycle at `now_ms`.
    pub fn restart_cycle(&mut self, now_ms: i64) {
        self.countdown_end_epoch_ms = now_ms + i64::from(self.draw_interval_secs) * 1000;
        self.refresh(now_ms);
    }

    /// Takes an end time published by a peer.
    pub fn adopt_end(&mut self, countdown_end_epoch_ms: i64, now_ms: i64) {
        self.countdown_end_epoch_ms = countdown_end_epoch_ms;
        self.refresh(now_ms);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Running,
    ResetPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer not started (or stopped).
    Idle,
    Counting { remaining: u32 },
    /// The cycle ending at `boundary_ms` is over; run the reset action once.
    CycleReset { boundary_ms: i64 },
    /// Still at zero after the reset fired; waiting for the new cycle.
    AwaitingReset,
}

/// Detects cycle ends and fires the reset exactly once per boundary.
#[derive(Debug, Clone)]
pub struct CycleTimer {
    phase: CyclePhase,
    refresh_triggered: bool,
    // End time seen on the previous tick.
    tracked_end_ms: Option<i64>,
    fired_for_end_ms: Option<i64>,
}

impl Default for CycleTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleTimer {
    pub fn new() -> Self {
        Self {
            phase: CyclePhase::Idle,
            refresh_triggered: false,
            tracked_end_ms: None,
            fired_for_end_ms: None,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn refresh_triggered(&self) -> bool {
        self.refresh_triggered
    }

    pub fn start(&mut self) {
        if self.phase == CyclePhase::Idle {
            self.phase = CyclePhase::Running;
        }
    }

    pub fn stop(&mut self) {
        *self = Self::new();
    }

    /// Called once the reset action finished and a new cycle is under way.
    pub fn complete_reset(&mut self) {
        if self.phase == CyclePhase::ResetPending {
            self.phase = CyclePhase::Running;
        }
    }

    pub fn tick(&mut self, state: &mut TimerState, now_ms: i64) -> TickOutcome {
        if self.phase == CyclePhase::Idle {
            return TickOutcome::Idle;
        }

        let remaining = state.refresh(now_ms);
        let end = state.countdown_end_epoch_ms;

        // A sync or peer update can move the end past a boundary no tick saw at zero.
        let missed = self.tracked_end_ms.filter(|prev| {
            *prev != end && now_ms + BOUNDARY_TOLERANCE_MS >= *prev && !self.already_fired(*prev)
        });
        self.tracked_end_ms = Some(end);

        let boundary = if remaining == 0 { Some(end) } else { missed };
        match boundary {
            Some(boundary_ms) if !self.already_fired(boundary_ms) => {
                self.fired_for_end_ms = Some(boundary_ms);
                self.refresh_triggered = true;
                self.phase = CyclePhase::ResetPending;
                TickOutcome::CycleReset { boundary_ms }
            }
            Some(_) => TickOutcome::AwaitingReset,
            None => {
                if self.phase == CyclePhase::Running {
                    self.refresh_triggered = false;
                }
                TickOutcome::Counting { remaining }
            }
        }
    }

    fn already_fired(&self, boundary_ms: i64) -> bool {
        self.fired_for_end_ms
            .is_some_and(|fired| (fired - boundary_ms).abs() < BOUNDARY_TOLERANCE_MS)
    }
}

/// Display band for the remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
}

impl Urgency {
    pub fn for_remaining(remaining_seconds: u32) -> Self {
        match remaining_seconds {
            0..=10 => Urgency::Critical,
            11..=30 => Urgency::Warning,
            _ => Urgency::Normal,
        }
    }
}

pub fn format_countdown(remaining_seconds: u32) -> String {
    format!("{:02}:{:02}", remaining_seconds / 60, remaining_seconds % 60)
}
