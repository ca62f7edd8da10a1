// Conversions between session state and peer messages.

use crate::domain::{
    ChannelMessage, DrawNumberState, TimerState, TimerUpdate, UpcomingDraw,
};
use crate::use_cases::types::SessionSettings;

pub fn build_timer_update(
    origin: u64,
    timer: &TimerState,
    draws: &DrawNumberState,
    now_ms: i64,
) -> TimerUpdate {
    TimerUpdate {
        origin,
        countdown_end_time: timer.countdown_end_epoch_ms,
        remaining_seconds: timer.remaining_at(now_ms),
        current_draw_number: draws.current_draw_number,
        next_draw_number: draws.next_draw_number,
        upcoming_draws: draws.upcoming_numbers(),
        upcoming_draw_times: draws.upcoming_draws.iter().map(|d| d.starts_at_ms).collect(),
        timestamp: now_ms,
    }
}

/// What a peer message did to the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEffect {
    /// Own message, or a timer update for a cycle that already ended.
    Ignored,
    TimerAdopted,
    DrawCompleted { draw_number: u64 },
}

/// Overwrites local state with a peer's message (last write wins).
pub fn apply_peer_message(
    own_origin: u64,
    message: &ChannelMessage,
    timer: &mut TimerState,
    draws: &mut DrawNumberState,
    settings: &SessionSettings,
    now_ms: i64,
) -> PeerEffect {
    if message.origin() == own_origin {
        return PeerEffect::Ignored;
    }

    match message {
        ChannelMessage::TimerUpdate(update) => {
            if update.countdown_end_time <= now_ms {
                return PeerEffect::Ignored;
            }
            timer.adopt_end(update.countdown_end_time, now_ms);
            *draws = draws_from_update(update, timer.remaining_seconds, settings, now_ms);
            PeerEffect::TimerAdopted
        }
        ChannelMessage::DrawComplete { draw_number, .. } => {
            timer.restart_cycle(now_ms);
            *draws = DrawNumberState::from_base(
                *draw_number,
                settings.upcoming_draw_count,
                now_ms,
                timer.remaining_seconds,
                settings.cycle_duration_secs,
            );
            PeerEffect::DrawCompleted {
                draw_number: *draw_number,
            }
        }
    }
}

/// Draw state carried by an update; regenerated from its base when the list is
/// missing, misaligned or has gaps.
pub fn draws_from_update(
    update: &TimerUpdate,
    remaining_seconds: u32,
    settings: &SessionSettings,
    now_ms: i64,
) -> DrawNumberState {
    let carried = DrawNumberState {
        current_draw_number: update.current_draw_number,
        next_draw_number: update.next_draw_number,
        upcoming_draws: update
            .upcoming_draws
            .iter()
            .zip(&update.upcoming_draw_times)
            .map(|(draw_number, starts_at_ms)| UpcomingDraw {
                draw_number: *draw_number,
                starts_at_ms: *starts_at_ms,
            })
            .collect(),
    };

    let complete = carried.upcoming_draws.len() == settings.upcoming_draw_count
        && update.upcoming_draws.len() == update.upcoming_draw_times.len();
    if complete && carried.is_consistent() {
        carried
    } else {
        DrawNumberState::from_base(
            update.current_draw_number,
            settings.upcoming_draw_count,
            now_ms,
            remaining_seconds,
            settings.cycle_duration_secs,
        )
    }
}
