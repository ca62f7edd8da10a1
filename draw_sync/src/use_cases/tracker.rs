// Operator draw selection, persisted in the session-scoped store.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::errors::SelectionError;
use crate::domain::ports::KeyValueStore;
use crate::domain::DrawNumberState;
use crate::use_cases::types::DrawSelected;

pub const SELECTED_DRAW_KEY: &str = "selected_draw_number";

/// Selected draw for new slips. The value lives in the store so it survives a
/// session rebuild; changes are announced on a broadcast channel.
pub struct DrawSelection {
    store: Arc<dyn KeyValueStore>,
    auto_select: bool,
    events: broadcast::Sender<DrawSelected>,
}

impl DrawSelection {
    pub fn new(store: Arc<dyn KeyValueStore>, auto_select: bool, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            store,
            auto_select,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DrawSelected> {
        self.events.subscribe()
    }

    /// Stored selection, if any. A value that does not parse is treated as absent.
    pub async fn get(&self) -> Result<Option<u64>, SelectionError> {
        let raw = self.store.get(SELECTED_DRAW_KEY).await?;
        Ok(raw.and_then(|value| match value.trim().parse::<u64>() {
            Ok(draw_number) if draw_number > 0 => Some(draw_number),
            _ => {
                warn!(value = %value, "ignoring unreadable selected draw");
                None
            }
        }))
    }

    pub async fn set(
        &self,
        draw_number: i64,
        draws: &DrawNumberState,
    ) -> Result<u64, SelectionError> {
        let draw_number = u64::try_from(draw_number)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(SelectionError::NotPositive)?;

        if draws.current_draw_number > 0 && draw_number <= draws.current_draw_number {
            return Err(SelectionError::AlreadyCompleted {
                draw_number,
                current_draw_number: draws.current_draw_number,
            });
        }

        self.store
            .set(SELECTED_DRAW_KEY, &draw_number.to_string())
            .await?;
        info!(draw_number, "draw selected");
        self.announce(Some(draw_number));
        Ok(draw_number)
    }

    /// Removes the selection. Returns whether one existed.
    pub async fn clear(&self) -> Result<bool, SelectionError> {
        let removed = self.store.remove(SELECTED_DRAW_KEY).await?;
        if removed {
            info!("draw selection cleared");
            self.announce(None);
        }
        Ok(removed)
    }

    /// Draw to stamp on a new slip: the selection while it is still open, otherwise
    /// the next draw when auto-select is on.
    pub async fn draw_for_new_slip(
        &self,
        draws: &DrawNumberState,
    ) -> Result<Option<u64>, SelectionError> {
        if let Some(selected) = self.get().await? {
            if selected > draws.current_draw_number {
                return Ok(Some(selected));
            }
            warn!(
                selected,
                current_draw_number = draws.current_draw_number,
                "selected draw already completed; clearing"
            );
            self.clear().await?;
        }

        if !self.auto_select {
            return Ok(None);
        }
        Ok(draws
            .upcoming_draws
            .first()
            .map(|draw| draw.draw_number)
            .or(Some(draws.next_draw_number)))
    }

    fn announce(&self, draw_number: Option<u64>) {
        if self.events.send(DrawSelected { draw_number }).is_err() {
            debug!("no selection listeners");
        }
    }
}
