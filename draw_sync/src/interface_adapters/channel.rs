// StateChannel transports: in-process pub/sub and shared-storage polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::domain::errors::ChannelError;
use crate::domain::ports::{KeyValueStore, StateChannel};
use crate::domain::{ChannelMessage, TimerUpdate};
use crate::use_cases::mirror;

/// Named in-process channel; every subscriber sees every message.
pub struct BroadcastChannel {
    name: String,
    tx: broadcast::Sender<ChannelMessage>,
    capacity: usize,
}

impl BroadcastChannel {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            name: name.into(),
            tx,
            capacity,
        }
    }
}

#[async_trait]
impl StateChannel for BroadcastChannel {
    async fn publish(&self, message: ChannelMessage) -> Result<(), ChannelError> {
        self.tx
            .send(message)
            .map(|_| ())
            .map_err(|_| ChannelError::NoSubscribers)
    }

    fn subscribe(&self) -> mpsc::Receiver<ChannelMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        tokio::spawn(forward_broadcast(
            self.name.clone(),
            self.tx.subscribe(),
            tx,
        ));
        rx
    }

    fn name(&self) -> &str {
        &self.name
    }
}

async fn forward_broadcast(
    name: String,
    mut source: broadcast::Receiver<ChannelMessage>,
    sink: mpsc::Sender<ChannelMessage>,
) {
    loop {
        let message = tokio::select! {
            _ = sink.closed() => break,
            received = source.recv() => received,
        };
        match message {
            Ok(message) => {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // Every timer update is a full state, so skipping to the latest is safe.
                warn!(channel = %name, missed = n, "channel subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!(channel = %name, "channel subscriber closed");
}

/// Channel over shared key/value storage. Publishing writes the mirror keys;
/// each subscriber polls them and emits whatever changed since its last look.
pub struct StoragePollingChannel {
    name: String,
    store: Arc<dyn KeyValueStore>,
    poll_interval: Duration,
    capacity: usize,
}

impl StoragePollingChannel {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
        poll_interval: Duration,
        capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl StateChannel for StoragePollingChannel {
    async fn publish(&self, message: ChannelMessage) -> Result<(), ChannelError> {
        match &message {
            ChannelMessage::TimerUpdate(update) => {
                mirror::write_timer_update(self.store.as_ref(), update).await
            }
            ChannelMessage::DrawComplete {
                origin,
                draw_number,
                timestamp,
            } => {
                mirror::write_draw_complete(self.store.as_ref(), *origin, *draw_number, *timestamp)
                    .await
            }
        }
    }

    fn subscribe(&self) -> mpsc::Receiver<ChannelMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        tokio::spawn(poll_storage(
            self.name.clone(),
            self.store.clone(),
            self.poll_interval,
            tx,
        ));
        rx
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// Cached copies of what the subscriber last saw.
#[derive(Default)]
struct PollCache {
    timer: Option<TimerUpdate>,
    draw_complete: Option<ChannelMessage>,
    primed: bool,
}

impl PollCache {
    /// Messages that differ from the cache. Draw completions already present on the
    /// first poll are history and only prime the cache.
    fn diff(
        &mut self,
        timer: Option<TimerUpdate>,
        draw_complete: Option<ChannelMessage>,
    ) -> Vec<ChannelMessage> {
        let mut changed = Vec::new();

        if timer.is_some() && timer != self.timer {
            self.timer = timer.clone();
            changed.extend(timer.map(ChannelMessage::TimerUpdate));
        }

        if draw_complete.is_some() && draw_complete != self.draw_complete {
            self.draw_complete = draw_complete.clone();
            if self.primed {
                changed.extend(draw_complete);
            }
        }

        self.primed = true;
        changed
    }
}

async fn poll_storage(
    name: String,
    store: Arc<dyn KeyValueStore>,
    poll_interval: Duration,
    sink: mpsc::Sender<ChannelMessage>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cache = PollCache::default();

    loop {
        tokio::select! {
            _ = sink.closed() => break,
            _ = ticker.tick() => {}
        }

        let timer = match mirror::read_timer_update(store.as_ref()).await {
            Ok(timer) => timer,
            Err(err) => {
                warn!(channel = %name, error = %err, "failed to poll timer state");
                continue;
            }
        };
        let draw_complete = match mirror::read_draw_complete(store.as_ref()).await {
            Ok(message) => message,
            Err(err) => {
                warn!(channel = %name, error = %err, "failed to poll draw completion");
                continue;
            }
        };

        for message in cache.diff(timer, draw_complete) {
            if sink.send(message).await.is_err() {
                debug!(channel = %name, "poll subscriber closed");
                return;
            }
        }
    }
    debug!(channel = %name, "poll subscriber closed");
}
