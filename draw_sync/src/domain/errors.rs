// Domain-level errors for sync, storage and channel workflows.

use std::fmt;

/// Failures while talking to the time or draw endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Request never produced a response (connect, timeout, DNS).
    Transport(String),
    /// Upstream answered with a non-success HTTP status.
    Status(u16),
    /// Body was not the expected JSON shape or reported an error status.
    Parse(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Transport(err) => write!(f, "sync transport error: {err}"),
            SyncError::Status(status) => write!(f, "sync upstream status {status}"),
            SyncError::Parse(err) => write!(f, "sync response invalid: {err}"),
        }
    }
}

impl std::error::Error for SyncError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Io(String),
    Unavailable,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "store io error: {err}"),
            StoreError::Unavailable => write!(f, "store unavailable"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Nobody is subscribed; the message went nowhere.
    NoSubscribers,
    Store(StoreError),
    Encode(String),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::NoSubscribers => write!(f, "channel has no subscribers"),
            ChannelError::Store(err) => write!(f, "channel storage failed: {err}"),
            ChannelError::Encode(err) => write!(f, "channel encode failed: {err}"),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<StoreError> for ChannelError {
    fn from(err: StoreError) -> Self {
        ChannelError::Store(err)
    }
}

/// Operator draw selection failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    NotPositive,
    AlreadyCompleted { draw_number: u64, current_draw_number: u64 },
    Store(StoreError),
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::NotPositive => write!(f, "draw_number must be positive"),
            SelectionError::AlreadyCompleted {
                draw_number,
                current_draw_number,
            } => write!(
                f,
                "draw {draw_number} is already completed (current draw {current_draw_number})"
            ),
            SelectionError::Store(err) => write!(f, "selection storage failed: {err}"),
        }
    }
}

impl std::error::Error for SelectionError {}

impl From<StoreError> for SelectionError {
    fn from(err: StoreError) -> Self {
        SelectionError::Store(err)
    }
}
