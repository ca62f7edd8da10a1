// Values that leave a session: peer messages and render snapshots.

use crate::domain::clock::SyncHealth;
use crate::domain::draws::UpcomingDraw;
use crate::domain::timer::{CyclePhase, Urgency};

/// Full timer state published to peer sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerUpdate {
    /// Session that produced the update.
    pub origin: u64,
    pub countdown_end_time: i64,
    pub remaining_seconds: u32,
    pub current_draw_number: u64,
    pub next_draw_number: u64,
    pub upcoming_draws: Vec<u64>,
    /// Epoch milliseconds, parallel to `upcoming_draws`.
    pub upcoming_draw_times: Vec<i64>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    TimerUpdate(TimerUpdate),
    DrawComplete {
        origin: u64,
        draw_number: u64,
        timestamp: i64,
    },
}

impl ChannelMessage {
    pub fn origin(&self) -> u64 {
        match self {
            ChannelMessage::TimerUpdate(update) => update.origin,
            ChannelMessage::DrawComplete { origin, .. } => *origin,
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySnapshot {
    pub session_id: u64,
    pub remaining_seconds: u32,
    /// `MM:SS` rendering of `remaining_seconds`.
    pub display: String,
    pub urgency: Urgency,
    pub phase: CyclePhase,
    pub sync_health: SyncHealth,
    pub current_draw_number: u64,
    pub next_draw_number: u64,
    pub upcoming_draws: Vec<UpcomingDraw>,
    /// `HH:MM:SS` Georgetown labels, parallel to `upcoming_draws`.
    pub upcoming_draw_times: Vec<String>,
    pub selected_draw: Option<u64>,
    pub countdown_end_ms: i64,
    pub georgetown_time_ms: i64,
    /// `HH:MM:SS` label of `georgetown_time_ms`.
    pub georgetown_clock: String,
    pub timestamp_ms: i64,
}
