// Use cases layer: session workflows for the draw countdown.

pub mod broadcast;
pub mod mirror;
pub mod reset;
pub mod session;
pub mod sync;
pub mod tracker;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use reset::{CycleResetStrategy, HardReload, ResetAction, SoftResync};
pub use session::{DisplaySession, SessionContext, SessionSupervisor, run_session};
pub use tracker::DrawSelection;
pub use types::{DrawSelected, SessionExit, SessionSettings};
