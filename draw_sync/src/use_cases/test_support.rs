use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::errors::{ChannelError, StoreError, SyncError};
use crate::domain::ports::{Clock, DrawSource, KeyValueStore, Renderer, StateChannel, TimeSource};
use crate::domain::{ChannelMessage, DisplaySnapshot, DrawHeader, ServerTimeSample};

// Manually driven time source for deterministic use-case tests.
pub(crate) struct ManualClock(AtomicI64);

impl ManualClock {
    pub(crate) fn new(now_ms: i64) -> Self {
        Self(AtomicI64::new(now_ms))
    }

    pub(crate) fn set(&self, now_ms: i64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

// Returns queued responses in order, then fails as if offline.
pub(crate) struct ScriptedTimeSource {
    responses: Mutex<VecDeque<Result<ServerTimeSample, SyncError>>>,
    calls: AtomicUsize,
}

impl ScriptedTimeSource {
    pub(crate) fn new(responses: Vec<Result<ServerTimeSample, SyncError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn offline() -> Self {
        Self::new(Vec::new())
    }

    pub(crate) fn push(&self, response: Result<ServerTimeSample, SyncError>) {
        let mut guard = self.responses.lock().expect("responses mutex poisoned");
        guard.push_back(response);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeSource for ScriptedTimeSource {
    async fn fetch_time(&self) -> Result<ServerTimeSample, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.responses.lock().expect("responses mutex poisoned");
        guard
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Transport("offline".to_string())))
    }
}

// Never answers, like a server that hangs until the client times out.
#[derive(Default)]
pub(crate) struct StalledTimeSource {
    calls: AtomicUsize,
}

impl StalledTimeSource {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeSource for StalledTimeSource {
    async fn fetch_time(&self) -> Result<ServerTimeSample, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub(crate) fn sample_at(now_ms: i64, seconds_remaining: i64) -> ServerTimeSample {
    ServerTimeSample {
        timestamp_secs: now_ms / 1000,
        seconds_remaining,
        formatted: String::new(),
        next_cycle_start: None,
    }
}

pub(crate) struct StaticDrawSource {
    response: Mutex<Result<DrawHeader, SyncError>>,
}

impl StaticDrawSource {
    pub(crate) fn answering(header: DrawHeader) -> Self {
        Self {
            response: Mutex::new(Ok(header)),
        }
    }

    pub(crate) fn failing(err: SyncError) -> Self {
        Self {
            response: Mutex::new(Err(err)),
        }
    }

    pub(crate) fn set(&self, response: Result<DrawHeader, SyncError>) {
        let mut guard = self.response.lock().expect("response mutex poisoned");
        *guard = response;
    }
}

#[async_trait]
impl DrawSource for StaticDrawSource {
    async fn fetch_draw_header(&self) -> Result<DrawHeader, SyncError> {
        let guard = self.response.lock().expect("response mutex poisoned");
        guard.clone()
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct FailureFlags {
    pub get: bool,
    pub set: bool,
    pub remove: bool,
}

#[derive(Clone)]
pub(crate) struct RecordingStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    failures: FailureFlags,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(HashMap::new())),
            failures: FailureFlags::default(),
        }
    }

    pub(crate) fn with_failures(mut self, failures: FailureFlags) -> Self {
        self.failures = failures;
        self
    }

    pub(crate) fn insert_value(&self, key: &str, value: &str) {
        let mut guard = self.values.lock().expect("values mutex poisoned");
        guard.insert(key.to_string(), value.to_string());
    }

    pub(crate) fn value(&self, key: &str) -> Option<String> {
        let guard = self.values.lock().expect("values mutex poisoned");
        guard.get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.failures.get {
            return Err(StoreError::Io("get failed".to_string()));
        }

        let guard = self.values.lock().expect("values mutex poisoned");
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.failures.set {
            return Err(StoreError::Io("set failed".to_string()));
        }

        let mut guard = self.values.lock().expect("values mutex poisoned");
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        if self.failures.remove {
            return Err(StoreError::Io("remove failed".to_string()));
        }

        let mut guard = self.values.lock().expect("values mutex poisoned");
        Ok(guard.remove(key).is_some())
    }
}

// Keeps every published message and lets tests inject peer messages.
#[derive(Default)]
pub(crate) struct RecordingChannel {
    published: Mutex<Vec<ChannelMessage>>,
    subscribers: Mutex<Vec<mpsc::Sender<ChannelMessage>>>,
}

impl RecordingChannel {
    pub(crate) fn published(&self) -> Vec<ChannelMessage> {
        let guard = self.published.lock().expect("published mutex poisoned");
        guard.clone()
    }

    pub(crate) fn inject(&self, message: ChannelMessage) {
        let guard = self.subscribers.lock().expect("subscribers mutex poisoned");
        for tx in guard.iter() {
            let _ = tx.try_send(message.clone());
        }
    }
}

#[async_trait]
impl StateChannel for RecordingChannel {
    async fn publish(&self, message: ChannelMessage) -> Result<(), ChannelError> {
        let mut guard = self.published.lock().expect("published mutex poisoned");
        guard.push(message);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<ChannelMessage> {
        let (tx, rx) = mpsc::channel(64);
        let mut guard = self.subscribers.lock().expect("subscribers mutex poisoned");
        guard.push(tx);
        rx
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Default)]
pub(crate) struct RecordingRenderer {
    frames: Mutex<Vec<DisplaySnapshot>>,
}

impl RecordingRenderer {
    pub(crate) fn frames(&self) -> Vec<DisplaySnapshot> {
        let guard = self.frames.lock().expect("frames mutex poisoned");
        guard.clone()
    }

    pub(crate) fn last(&self) -> Option<DisplaySnapshot> {
        self.frames().pop()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, snapshot: &DisplaySnapshot) {
        let mut guard = self.frames.lock().expect("frames mutex poisoned");
        guard.push(snapshot.clone());
    }
}
