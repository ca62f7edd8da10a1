// Shared-storage mirror of the timer state, read back on rebuild and by the polling transport.
//
// tv_display_previous_draw holds the last completed draw, tv_display_current_draw the
// draw open for betting.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{ChannelError, StoreError};
use crate::domain::ports::KeyValueStore;
use crate::domain::{ChannelMessage, TimerUpdate};

pub const PREVIOUS_DRAW_KEY: &str = "tv_display_previous_draw";
pub const CURRENT_DRAW_KEY: &str = "tv_display_current_draw";
pub const SYNC_TIME_KEY: &str = "tv_display_sync_time";
pub const UPCOMING_DRAWS_KEY: &str = "tv_display_upcoming_draws";
pub const COUNTDOWN_END_KEY: &str = "roulette_countdown_end_time";
pub const UPCOMING_DRAW_TIMES_KEY: &str = "roulette_upcoming_draw_times";
pub const TIMER_ORIGIN_KEY: &str = "roulette_timer_origin";
pub const DRAW_COMPLETE_KEY: &str = "roulette_draw_complete";

#[derive(Debug, Serialize, Deserialize)]
struct DrawCompleteRecord {
    origin: u64,
    draw_number: u64,
    timestamp: i64,
}

pub async fn write_timer_update(
    store: &dyn KeyValueStore,
    update: &TimerUpdate,
) -> Result<(), ChannelError> {
    let upcoming = encode(&update.upcoming_draws)?;
    let upcoming_times = encode(&update.upcoming_draw_times)?;

    store
        .set(PREVIOUS_DRAW_KEY, &update.current_draw_number.to_string())
        .await?;
    store
        .set(CURRENT_DRAW_KEY, &update.next_draw_number.to_string())
        .await?;
    store.set(UPCOMING_DRAWS_KEY, &upcoming).await?;
    store.set(UPCOMING_DRAW_TIMES_KEY, &upcoming_times).await?;
    store
        .set(COUNTDOWN_END_KEY, &update.countdown_end_time.to_string())
        .await?;
    store.set(TIMER_ORIGIN_KEY, &update.origin.to_string()).await?;
    // Written last: readers treat a new sync time as a complete update.
    store
        .set(SYNC_TIME_KEY, &update.timestamp.to_string())
        .await?;
    Ok(())
}

/// Reads the mirrored state. `None` until a countdown end has been written.
pub async fn read_timer_update(
    store: &dyn KeyValueStore,
) -> Result<Option<TimerUpdate>, StoreError> {
    let Some(countdown_end_time) = read_number::<i64>(store, COUNTDOWN_END_KEY).await? else {
        return Ok(None);
    };

    let current_draw_number = read_number::<u64>(store, PREVIOUS_DRAW_KEY)
        .await?
        .unwrap_or(0);
    let next_draw_number = read_number::<u64>(store, CURRENT_DRAW_KEY)
        .await?
        .unwrap_or(current_draw_number + 1);
    let timestamp = read_number::<i64>(store, SYNC_TIME_KEY).await?.unwrap_or(0);
    let origin = read_number::<u64>(store, TIMER_ORIGIN_KEY)
        .await?
        .unwrap_or(0);
    let upcoming_draws = read_list::<u64>(store, UPCOMING_DRAWS_KEY).await?;
    let upcoming_draw_times = read_list::<i64>(store, UPCOMING_DRAW_TIMES_KEY).await?;

    let remaining_ms = (countdown_end_time - timestamp).max(0);
    Ok(Some(TimerUpdate {
        origin,
        countdown_end_time,
        remaining_seconds: u32::try_from(remaining_ms / 1000).unwrap_or(u32::MAX),
        current_draw_number,
        next_draw_number,
        upcoming_draws,
        upcoming_draw_times,
        timestamp,
    }))
}

pub async fn write_draw_complete(
    store: &dyn KeyValueStore,
    origin: u64,
    draw_number: u64,
    timestamp: i64,
) -> Result<(), ChannelError> {
    let record = encode(&DrawCompleteRecord {
        origin,
        draw_number,
        timestamp,
    })?;
    store.set(DRAW_COMPLETE_KEY, &record).await?;
    Ok(())
}

pub async fn read_draw_complete(
    store: &dyn KeyValueStore,
) -> Result<Option<ChannelMessage>, StoreError> {
    let Some(raw) = store.get(DRAW_COMPLETE_KEY).await? else {
        return Ok(None);
    };
    Ok(serde_json::from_str::<DrawCompleteRecord>(&raw)
        .ok()
        .map(|record| ChannelMessage::DrawComplete {
            origin: record.origin,
            draw_number: record.draw_number,
            timestamp: record.timestamp,
        }))
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, ChannelError> {
    serde_json::to_string(value).map_err(|e| ChannelError::Encode(e.to_string()))
}

async fn read_number<T: std::str::FromStr>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    Ok(store
        .get(key)
        .await?
        .and_then(|value| value.trim().parse::<T>().ok()))
}

// Missing or malformed lists read as empty; callers regenerate them.
async fn read_list<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Vec<T>, StoreError> {
    Ok(store
        .get(key)
        .await?
        .and_then(|value| serde_json::from_str::<Vec<T>>(&value).ok())
        .unwrap_or_default())
}
