// Draw numbering: the completed base draw and the draws open for betting.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Draw number with its estimated start on the local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpcomingDraw {
    pub draw_number: u64,
    pub starts_at_ms: i64,
}

/// Authoritative draw header from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawHeader {
    pub current_draw_number: u64,
    pub draw_numbers: Vec<u64>,
}

/// Returns `[base+1 ..= base+count]`, the first starting `seconds_remaining` from now and
/// each following one a full cycle later.
pub fn generate_upcoming_draws(
    base: u64,
    count: usize,
    now_ms: i64,
    seconds_remaining: u32,
    cycle_duration_secs: u32,
) -> Vec<UpcomingDraw> {
    let first_start = now_ms + i64::from(seconds_remaining) * 1000;
    let cycle_ms = i64::from(cycle_duration_secs) * 1000;

    (0..count as u64)
        .map(|offset| UpcomingDraw {
            draw_number: base + offset + 1,
            starts_at_ms: first_start + offset as i64 * cycle_ms,
        })
        .collect()
}

/// Current/next/upcoming draw numbers for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawNumberState {
    /// Most recently completed draw (the base); 0 until a first draw is known.
    pub current_draw_number: u64,
    /// Draw open for betting.
    pub next_draw_number: u64,
    pub upcoming_draws: Vec<UpcomingDraw>,
}

impl DrawNumberState {
    pub fn from_base(
        base: u64,
        count: usize,
        now_ms: i64,
        seconds_remaining: u32,
        cycle_duration_secs: u32,
    ) -> Self {
        Self {
            current_draw_number: base,
            next_draw_number: base + 1,
            upcoming_draws: generate_upcoming_draws(
                base,
                count,
                now_ms,
                seconds_remaining,
                cycle_duration_secs,
            ),
        }
    }

    /// Moves the base to `base` and regenerates the sequence. Returns true if the base changed.
    pub fn rebase(
        &mut self,
        base: u64,
        count: usize,
        now_ms: i64,
        seconds_remaining: u32,
        cycle_duration_secs: u32,
    ) -> bool {
        let changed = base != self.current_draw_number;
        *self = Self::from_base(base, count, now_ms, seconds_remaining, cycle_duration_secs);
        changed
    }

    /// Marks the open draw as completed.
    pub fn advance(
        &mut self,
        count: usize,
        now_ms: i64,
        seconds_remaining: u32,
        cycle_duration_secs: u32,
    ) {
        let base = self.current_draw_number + 1;
        self.rebase(base, count, now_ms, seconds_remaining, cycle_duration_secs);
    }

    pub fn upcoming_numbers(&self) -> Vec<u64> {
        self.upcoming_draws.iter().map(|d| d.draw_number).collect()
    }

    /// True when the upcoming list is exactly `base+1, base+2, ...`.
    pub fn is_consistent(&self) -> bool {
        self.next_draw_number == self.current_draw_number + 1
            && self
                .upcoming_draws
                .iter()
                .enumerate()
                .all(|(i, d)| d.draw_number == self.current_draw_number + i as u64 + 1)
    }
}

/// Formats an epoch-millisecond instant as `HH:MM:SS` in a fixed UTC offset.
pub fn format_clock(epoch_ms: i64, utc_offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|t| t.with_timezone(&offset).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}
