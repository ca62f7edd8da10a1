// Domain layer: clock, cycle and draw rules with no I/O.

pub mod clock;
pub mod draws;
pub mod errors;
pub mod ports;
pub mod snapshot;
pub mod timer;

pub use clock::{ClockEstimator, EstimatorSettings, ServerTimeSample, SyncHealth};
pub use draws::{DrawHeader, DrawNumberState, UpcomingDraw, generate_upcoming_draws};
pub use errors::{ChannelError, SelectionError, StoreError, SyncError};
pub use snapshot::{ChannelMessage, DisplaySnapshot, TimerUpdate};
pub use timer::{CyclePhase, CycleTimer, TickOutcome, TimerState, Urgency, format_countdown};
