use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static STARTUP_NANOS: OnceLock<u64> = OnceLock::new();
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn startup_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

/// Id that is unique for the life of the process: session origins, connection spans and
/// cache busters on upstream requests.
///
/// The process start time in nanoseconds plus a per-call sequence number. Two ids taken in
/// the same instant still differ, and a restarted display does not reuse the origin ids its
/// peers remember from the previous run.
pub fn rand_id() -> u64 {
    let base = *STARTUP_NANOS.get_or_init(startup_nanos);
    base.wrapping_add(SEQUENCE.fetch_add(1, Ordering::Relaxed))
}
