use std::{env, path::PathBuf, time::Duration};

// Runtime/server configuration read from the environment (.env is loaded at startup).

pub fn http_port() -> u16 {
    env::var("DRAW_SYNC_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

pub fn time_sync_url() -> String {
    env::var("TIME_SYNC_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8080/php/get_georgetown_time.php".to_string())
}

pub fn draw_header_url() -> String {
    env::var("DRAW_HEADER_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8080/draw_header.php".to_string())
}

pub fn time_sync_timeout() -> Duration {
    millis_var("TIME_SYNC_TIMEOUT_MS", 1500)
}

pub fn sync_interval() -> Duration {
    millis_var("SYNC_INTERVAL_MS", 5000)
}

pub fn draw_header_sync_interval() -> Duration {
    millis_var("DRAW_HEADER_SYNC_INTERVAL_MS", 5000)
}

pub fn broadcast_interval() -> Duration {
    millis_var("BROADCAST_INTERVAL_MS", 1000)
}

pub fn storage_poll_interval() -> Duration {
    millis_var("STORAGE_POLL_INTERVAL_MS", 2000)
}

pub fn cycle_duration_secs() -> u32 {
    env::var("CYCLE_DURATION_SECS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(180)
}

pub fn upcoming_draw_count() -> usize {
    env::var("UPCOMING_DRAW_COUNT")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|count| *count > 0)
        .unwrap_or(10)
}

pub fn fallback_utc_offset_hours() -> i32 {
    env::var("FALLBACK_UTC_OFFSET_HOURS")
        .ok()
        .and_then(|v| v.parse::<i32>().ok())
        .filter(|hours| (-23..=23).contains(hours))
        .unwrap_or(-4)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Broadcast,
    StoragePolling,
}

pub fn state_channel() -> ChannelKind {
    match env::var("STATE_CHANNEL").as_deref().map(str::trim) {
        Ok("storage") | Ok("polling") => ChannelKind::StoragePolling,
        _ => ChannelKind::Broadcast,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Soft,
    Hard,
}

pub fn cycle_reset() -> ResetKind {
    match env::var("CYCLE_RESET").as_deref().map(str::trim) {
        Ok("hard") => ResetKind::Hard,
        _ => ResetKind::Soft,
    }
}

pub fn auto_select_next_draw() -> bool {
    env::var("AUTO_SELECT_NEXT_DRAW")
        .ok()
        .and_then(|v| v.trim().parse::<bool>().ok())
        .unwrap_or(true)
}

pub fn state_file() -> Option<PathBuf> {
    env::var("STATE_FILE")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub fn display_sessions() -> usize {
    env::var("DISPLAY_SESSIONS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

// Zero would make tokio intervals panic.
fn millis_var(name: &str, default_ms: u64) -> Duration {
    let millis = env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(millis.max(1))
}

pub const CHANNEL_NAME: &str = "roulette_timer_channel";
pub const CHANNEL_CAPACITY: usize = 64;
pub const SELECTION_EVENTS_CAPACITY: usize = 16;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000);
pub const HARD_RELOAD_DELAY: Duration = Duration::from_millis(500);
