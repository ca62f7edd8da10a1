// Wire protocol DTOs for the display surface (HTTP state and WebSocket stream).
// Upstream endpoint payloads live with their clients.

use crate::domain::{CyclePhase, DisplaySnapshot, SyncHealth, Urgency};
use serde::Serialize;

/// Messages the server pushes to WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Countdown frame, sent whenever the display changes.
    TimerUpdate(DisplaySnapshotDto),
    // Operator changed or cleared the draw selection.
    DrawSelected { draw_number: Option<u64> },
}

/// One rendered frame of the countdown display.
#[derive(Debug, Clone, Serialize)]
pub struct DisplaySnapshotDto {
    pub session_id: u64,
    pub remaining_seconds: u32,
    pub display: String,
    pub urgency: UrgencyDto,
    pub phase: PhaseDto,
    pub sync_health: SyncHealthDto,
    pub current_draw_number: u64,
    pub next_draw_number: u64,
    pub upcoming_draws: Vec<UpcomingDrawDto>,
    pub selected_draw: Option<u64>,
    pub countdown_end_time: i64,
    pub georgetown_time: i64,
    /// Georgetown wall clock, `HH:MM:SS`.
    pub georgetown_clock: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpcomingDrawDto {
    pub draw_number: u64,
    pub starts_at: i64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyDto {
    Normal,
    Warning,
    Critical,
}

impl From<Urgency> for UrgencyDto {
    fn from(urgency: Urgency) -> Self {
        match urgency {
            Urgency::Normal => UrgencyDto::Normal,
            Urgency::Warning => UrgencyDto::Warning,
            Urgency::Critical => UrgencyDto::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseDto {
    Idle,
    Running,
    ResetPending,
}

impl From<CyclePhase> for PhaseDto {
    fn from(phase: CyclePhase) -> Self {
        match phase {
            CyclePhase::Idle => PhaseDto::Idle,
            CyclePhase::Running => PhaseDto::Running,
            CyclePhase::ResetPending => PhaseDto::ResetPending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncHealthDto {
    Fresh,
    Aging,
    Stale,
}

impl From<SyncHealth> for SyncHealthDto {
    fn from(health: SyncHealth) -> Self {
        match health {
            SyncHealth::Fresh => SyncHealthDto::Fresh,
            SyncHealth::Aging => SyncHealthDto::Aging,
            SyncHealth::Stale => SyncHealthDto::Stale,
        }
    }
}

impl From<&DisplaySnapshot> for DisplaySnapshotDto {
    fn from(snapshot: &DisplaySnapshot) -> Self {
        Self {
            session_id: snapshot.session_id,
            remaining_seconds: snapshot.remaining_seconds,
            display: snapshot.display.clone(),
            urgency: snapshot.urgency.into(),
            phase: snapshot.phase.into(),
            sync_health: snapshot.sync_health.into(),
            current_draw_number: snapshot.current_draw_number,
            next_draw_number: snapshot.next_draw_number,
            upcoming_draws: snapshot
                .upcoming_draws
                .iter()
                .zip(&snapshot.upcoming_draw_times)
                .map(|(draw, label)| UpcomingDrawDto {
                    draw_number: draw.draw_number,
                    starts_at: draw.starts_at_ms,
                    label: label.clone(),
                })
                .collect(),
            selected_draw: snapshot.selected_draw,
            countdown_end_time: snapshot.countdown_end_ms,
            georgetown_time: snapshot.georgetown_time_ms,
            georgetown_clock: snapshot.georgetown_clock.clone(),
            timestamp: snapshot.timestamp_ms,
        }
    }
}
