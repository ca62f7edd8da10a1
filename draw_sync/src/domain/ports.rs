use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::clock::ServerTimeSample;
use crate::domain::draws::DrawHeader;
use crate::domain::errors::{ChannelError, StoreError, SyncError};
use crate::domain::snapshot::{ChannelMessage, DisplaySnapshot};

// Port for retrieving the current local time.
pub trait Clock: Send + Sync {
    fn now_epoch_millis(&self) -> i64;
}

// Port for the authoritative Georgetown time endpoint.
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn fetch_time(&self) -> Result<ServerTimeSample, SyncError>;
}

// Port for the backend draw header (current draw and upcoming numbers).
#[async_trait]
pub trait DrawSource: Send + Sync {
    async fn fetch_draw_header(&self) -> Result<DrawHeader, SyncError>;
}

// Port for string key/value storage shared between sessions or scoped to one.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

// Port for propagating timer state between sessions.
#[async_trait]
pub trait StateChannel: Send + Sync {
    async fn publish(&self, message: ChannelMessage) -> Result<(), ChannelError>;
    // Each call yields an independent stream of peer messages.
    fn subscribe(&self) -> mpsc::Receiver<ChannelMessage>;
    fn name(&self) -> &str;
}

// Port for the presentation side effect.
pub trait Renderer: Send + Sync {
    fn render(&self, snapshot: &DisplaySnapshot);
}
