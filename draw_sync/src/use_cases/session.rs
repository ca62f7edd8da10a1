// Display session: one countdown/draw view kept in sync with the server and its peers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::errors::ChannelError;
use crate::domain::ports::{Clock, DrawSource, KeyValueStore, Renderer, StateChannel, TimeSource};
use crate::domain::{
    ChannelMessage, ClockEstimator, CyclePhase, CycleTimer, DisplaySnapshot, DrawNumberState,
    TickOutcome, TimerState, TimerUpdate, Urgency, format_countdown,
};
use crate::domain::draws::format_clock;
use crate::use_cases::broadcast::{PeerEffect, apply_peer_message, build_timer_update, draws_from_update};
use crate::use_cases::mirror;
use crate::use_cases::reset::{CycleResetStrategy, ResetAction};
use crate::use_cases::sync::{DrawHeaderSyncUseCase, SyncOutcome, TimeSyncUseCase};
use crate::use_cases::tracker::DrawSelection;
use crate::use_cases::types::{SessionExit, SessionSettings};

// Boundaries closer than this are treated as the same draw.
const SAME_BOUNDARY_MS: i64 = 1000;

/// Collaborators injected into every session.
#[derive(Clone)]
pub struct SessionContext {
    pub clock: Arc<dyn Clock>,
    pub time_source: Arc<dyn TimeSource>,
    pub draw_source: Arc<dyn DrawSource>,
    /// Storage shared by all sessions (timer mirror).
    pub shared_store: Arc<dyn KeyValueStore>,
    pub channel: Arc<dyn StateChannel>,
    pub renderer: Arc<dyn Renderer>,
    pub reset_strategy: Arc<dyn CycleResetStrategy>,
    /// Selection backed by session-scoped storage.
    pub selection: Arc<DrawSelection>,
    pub settings: SessionSettings,
}

struct SessionState {
    estimator: ClockEstimator,
    timer: TimerState,
    cycle: CycleTimer,
    draws: DrawNumberState,
    // Boundary whose draw was already counted, locally or by a peer.
    last_advanced_boundary_ms: Option<i64>,
    destroyed: bool,
}

pub struct DisplaySession {
    id: u64,
    ctx: SessionContext,
    state: Mutex<SessionState>,
    shutdown: Notify,
}

impl DisplaySession {
    /// Builds a session from whatever the shared mirror holds, falling back to the
    /// local clock and an unknown (zero) base draw.
    pub async fn restore(id: u64, ctx: SessionContext) -> Self {
        let now = ctx.clock.now_epoch_millis();
        let settings = &ctx.settings;
        let estimator = ClockEstimator::new(settings.estimator());
        let mut timer = TimerState::aligned(&estimator, now);

        let draws = match mirror::read_timer_update(ctx.shared_store.as_ref()).await {
            Ok(Some(update)) if update.countdown_end_time > now => {
                timer.adopt_end(update.countdown_end_time, now);
                debug!(
                    session_id = id,
                    current_draw_number = update.current_draw_number,
                    "restored timer state from mirror"
                );
                draws_from_update(&update, timer.remaining_seconds, settings, now)
            }
            Ok(Some(update)) => DrawNumberState::from_base(
                update.current_draw_number,
                settings.upcoming_draw_count,
                now,
                timer.remaining_seconds,
                settings.cycle_duration_secs,
            ),
            Ok(None) => DrawNumberState::from_base(
                0,
                settings.upcoming_draw_count,
                now,
                timer.remaining_seconds,
                settings.cycle_duration_secs,
            ),
            Err(err) => {
                warn!(session_id = id, error = %err, "failed to read timer mirror");
                DrawNumberState::from_base(
                    0,
                    settings.upcoming_draw_count,
                    now,
                    timer.remaining_seconds,
                    settings.cycle_duration_secs,
                )
            }
        };

        Self {
            id,
            state: Mutex::new(SessionState {
                estimator,
                timer,
                cycle: CycleTimer::new(),
                draws,
                last_advanced_boundary_ms: None,
                destroyed: false,
            }),
            ctx,
            shutdown: Notify::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.destroyed {
            return;
        }
        state.cycle.start();
        info!(
            session_id = self.id,
            channel = self.ctx.channel.name(),
            reset = self.ctx.reset_strategy.name(),
            "session started"
        );
    }

    /// One countdown step: refresh, render, and report a cycle end.
    pub async fn tick(&self) -> TickOutcome {
        let now = self.now();
        let (outcome, snapshot) = {
            let mut guard = self.state.lock().await;
            if guard.destroyed {
                return TickOutcome::Idle;
            }
            let state = &mut *guard;
            let outcome = state.cycle.tick(&mut state.timer, now);
            (outcome, self.snapshot_of(state, now))
        };

        if let TickOutcome::CycleReset { boundary_ms } = outcome {
            info!(session_id = self.id, boundary_ms, "cycle boundary reached");
        }
        self.render(snapshot).await;
        outcome
    }

    /// Fetches server time and realigns the countdown. Returns whether the server answered.
    pub async fn sync_time(&self) -> bool {
        let outcome = TimeSyncUseCase {
            time_source: self.ctx.time_source.as_ref(),
            clock: self.ctx.clock.as_ref(),
        }
        .execute()
        .await;

        let now = self.now();
        let update = {
            let mut guard = self.state.lock().await;
            if guard.destroyed {
                debug!(session_id = self.id, "session destroyed; dropping late time sync");
                return false;
            }
            let state = &mut *guard;
            if let SyncOutcome::Synced {
                sample,
                received_at_ms,
            } = &outcome
            {
                state.estimator.apply_sample(sample, *received_at_ms);
            }
            self.realign(state, now);
            build_timer_update(self.id, &state.timer, &state.draws, now)
        };

        self.publish(update).await;
        matches!(outcome, SyncOutcome::Synced { .. })
    }

    /// Fetches the backend draw header. Returns whether the base draw changed.
    pub async fn sync_draws(&self) -> bool {
        let Some(header) = (DrawHeaderSyncUseCase {
            draw_source: self.ctx.draw_source.as_ref(),
        })
        .execute()
        .await
        else {
            return false;
        };

        let now = self.now();
        let settings = &self.ctx.settings;
        let update = {
            let mut guard = self.state.lock().await;
            if guard.destroyed {
                debug!(session_id = self.id, "session destroyed; dropping late draw sync");
                return false;
            }
            let state = &mut *guard;
            let previous = state.draws.current_draw_number;
            let remaining = state.timer.remaining_at(now);
            let changed = state.draws.rebase(
                header.current_draw_number,
                settings.upcoming_draw_count,
                now,
                remaining,
                settings.cycle_duration_secs,
            );
            if !changed {
                return false;
            }
            info!(
                session_id = self.id,
                previous,
                current_draw_number = header.current_draw_number,
                "draw base updated from server"
            );
            build_timer_update(self.id, &state.timer, &state.draws, now)
        };

        self.publish(update).await;
        true
    }

    /// Time and draw sync on demand, then a publish.
    pub async fn force_sync(&self) -> bool {
        let (synced, _) = tokio::join!(self.sync_time(), self.sync_draws());
        self.publish_state().await;
        synced
    }

    /// Counts the draw for `boundary_ms` and starts the next cycle. Returns the completed
    /// draw, or `None` when this boundary was already counted.
    pub async fn complete_draw(&self, boundary_ms: i64) -> Option<u64> {
        let now = self.now();
        let settings = &self.ctx.settings;
        let (draw_number, update) = {
            let mut guard = self.state.lock().await;
            if guard.destroyed {
                return None;
            }
            let state = &mut *guard;
            if state
                .last_advanced_boundary_ms
                .is_some_and(|done| (done - boundary_ms).abs() < SAME_BOUNDARY_MS)
            {
                debug!(session_id = self.id, boundary_ms, "draw already counted for boundary");
                return None;
            }
            state.last_advanced_boundary_ms = Some(boundary_ms);

            let next_end = boundary_ms + settings.cycle_ms();
            if state.timer.countdown_end_epoch_ms < next_end - settings.cycle_ms() / 2 {
                state.timer.adopt_end(next_end, now);
            }
            state.draws.advance(
                settings.upcoming_draw_count,
                now,
                state.timer.remaining_seconds,
                settings.cycle_duration_secs,
            );
            (
                state.draws.current_draw_number,
                build_timer_update(self.id, &state.timer, &state.draws, now),
            )
        };

        info!(session_id = self.id, draw_number, "draw complete");
        self.send(ChannelMessage::DrawComplete {
            origin: self.id,
            draw_number,
            timestamp: now,
        })
        .await;
        self.publish(update).await;
        Some(draw_number)
    }

    /// Leaves `ResetPending` once the reset action is done.
    pub async fn finish_reset(&self) {
        {
            let mut state = self.state.lock().await;
            if state.destroyed {
                return;
            }
            state.cycle.complete_reset();
        }
        self.publish_state().await;
    }

    pub async fn apply_peer(&self, message: ChannelMessage) -> PeerEffect {
        let now = self.now();
        let settings = &self.ctx.settings;
        let mut guard = self.state.lock().await;
        if guard.destroyed {
            return PeerEffect::Ignored;
        }
        let state = &mut *guard;
        let end_before = state.timer.countdown_end_epoch_ms;

        let effect = apply_peer_message(
            self.id,
            &message,
            &mut state.timer,
            &mut state.draws,
            settings,
            now,
        );
        match effect {
            PeerEffect::DrawCompleted { draw_number } => {
                // The peer counted the boundary this session was approaching.
                if end_before - now <= settings.cycle_ms() / 2 {
                    state.last_advanced_boundary_ms = Some(end_before);
                }
                info!(
                    session_id = self.id,
                    origin = message.origin(),
                    draw_number,
                    "peer completed draw"
                );
            }
            PeerEffect::TimerAdopted => {
                debug!(session_id = self.id, origin = message.origin(), "adopted peer timer");
            }
            PeerEffect::Ignored => {}
        }
        effect
    }

    /// Publishes the full state to peers and the shared mirror.
    pub async fn publish_state(&self) {
        let now = self.now();
        let update = {
            let state = self.state.lock().await;
            if state.destroyed {
                return;
            }
            build_timer_update(self.id, &state.timer, &state.draws, now)
        };
        self.publish(update).await;
    }

    pub async fn snapshot(&self) -> DisplaySnapshot {
        let now = self.now();
        let mut snapshot = {
            let state = self.state.lock().await;
            self.snapshot_of(&state, now)
        };
        snapshot.selected_draw = self.selected_draw().await;
        snapshot
    }

    /// Renders the current state without stepping the cycle timer.
    pub async fn redraw(&self) {
        let now = self.now();
        let snapshot = {
            let state = self.state.lock().await;
            if state.destroyed {
                return;
            }
            self.snapshot_of(&state, now)
        };
        self.render(snapshot).await;
    }

    pub async fn draws(&self) -> DrawNumberState {
        self.state.lock().await.draws.clone()
    }

    pub async fn timer_state(&self) -> TimerState {
        self.state.lock().await.timer
    }

    pub async fn phase(&self) -> CyclePhase {
        self.state.lock().await.cycle.phase()
    }

    /// Stops the session. Results of in-flight syncs are dropped when they land.
    pub async fn destroy(&self) {
        {
            let mut state = self.state.lock().await;
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.cycle.stop();
        }
        self.shutdown.notify_one();
        info!(session_id = self.id, "session destroyed");
    }

    fn now(&self) -> i64 {
        self.ctx.clock.now_epoch_millis()
    }

    fn realign(&self, state: &mut SessionState, now: i64) {
        state.timer.align(&state.estimator, now);
        // Never count down to a boundary whose draw is already done.
        if let Some(done) = state.last_advanced_boundary_ms {
            let end = state.timer.countdown_end_epoch_ms;
            if end < done + SAME_BOUNDARY_MS {
                state.timer.adopt_end(end + self.ctx.settings.cycle_ms(), now);
            }
        }
    }

    fn snapshot_of(&self, state: &SessionState, now: i64) -> DisplaySnapshot {
        let remaining = state.timer.remaining_at(now);
        let utc_offset = self.ctx.settings.fallback_utc_offset_hours;
        DisplaySnapshot {
            session_id: self.id,
            remaining_seconds: remaining,
            display: format_countdown(remaining),
            urgency: Urgency::for_remaining(remaining),
            phase: state.cycle.phase(),
            sync_health: state.estimator.sync_health(now),
            current_draw_number: state.draws.current_draw_number,
            next_draw_number: state.draws.next_draw_number,
            upcoming_draws: state.draws.upcoming_draws.clone(),
            upcoming_draw_times: state
                .draws
                .upcoming_draws
                .iter()
                .map(|draw| {
                    format_clock(state.estimator.server_now_ms(draw.starts_at_ms), utc_offset)
                })
                .collect(),
            selected_draw: None,
            countdown_end_ms: state.timer.countdown_end_epoch_ms,
            georgetown_time_ms: state.estimator.server_now_ms(now),
            georgetown_clock: format_clock(state.estimator.server_now_ms(now), utc_offset),
            timestamp_ms: now,
        }
    }

    async fn selected_draw(&self) -> Option<u64> {
        self.ctx.selection.get().await.unwrap_or_else(|err| {
            debug!(session_id = self.id, error = %err, "selected draw unavailable");
            None
        })
    }

    async fn render(&self, mut snapshot: DisplaySnapshot) {
        snapshot.selected_draw = self.selected_draw().await;
        self.ctx.renderer.render(&snapshot);
    }

    async fn publish(&self, update: TimerUpdate) {
        if let Err(err) = mirror::write_timer_update(self.ctx.shared_store.as_ref(), &update).await
        {
            warn!(session_id = self.id, error = %err, "failed to mirror timer state");
        }
        self.send(ChannelMessage::TimerUpdate(update)).await;
    }

    async fn send(&self, message: ChannelMessage) {
        match self.ctx.channel.publish(message).await {
            Ok(()) => {}
            Err(ChannelError::NoSubscribers) => {
                debug!(session_id = self.id, "no peers listening");
            }
            Err(err) => {
                warn!(session_id = self.id, error = %err, "failed to publish timer state");
            }
        }
    }
}

/// Drives one session until shutdown or a reload request.
pub async fn run_session(session: Arc<DisplaySession>) -> SessionExit {
    let settings = session.ctx.settings.clone();
    let mut peer_rx = session.ctx.channel.subscribe();

    let mut tick = interval(settings.tick_interval);
    let mut time_sync = interval(settings.sync_interval);
    let mut draw_sync = interval(settings.draw_sync_interval);
    let mut broadcast = interval(settings.broadcast_interval);
    for timer in [&mut tick, &mut time_sync, &mut draw_sync, &mut broadcast] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    session.start().await;

    loop {
        tokio::select! {
            _ = session.shutdown.notified() => {
                return SessionExit::Shutdown;
            }
            _ = tick.tick() => {
                if let TickOutcome::CycleReset { boundary_ms } = session.tick().await {
                    session.complete_draw(boundary_ms).await;
                    let action = session.ctx.reset_strategy.on_cycle_end(&session).await;
                    if action == ResetAction::Reload {
                        return SessionExit::ReloadRequested;
                    }
                }
            }
            _ = time_sync.tick() => {
                // Fetches run detached so the countdown keeps ticking on stale state.
                let session = session.clone();
                tokio::spawn(async move { session.sync_time().await; }.in_current_span());
            }
            _ = draw_sync.tick() => {
                let session = session.clone();
                tokio::spawn(async move { session.sync_draws().await; }.in_current_span());
            }
            _ = broadcast.tick() => {
                session.publish_state().await;
            }
            Some(message) = peer_rx.recv() => {
                session.apply_peer(message).await;
            }
        }
    }
}

/// Owns the live session and rebuilds it on reload.
pub struct SessionSupervisor {
    ctx: SessionContext,
    current: RwLock<Option<Arc<DisplaySession>>>,
    stopping: AtomicBool,
}

impl SessionSupervisor {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            current: RwLock::new(None),
            stopping: AtomicBool::new(false),
        }
    }

    pub async fn current(&self) -> Option<Arc<DisplaySession>> {
        self.current.read().await.clone()
    }

    pub async fn run(self: Arc<Self>, next_id: fn() -> u64) {
        let mut rebuilds: u64 = 0;
        while !self.stopping.load(Ordering::SeqCst) {
            let session = Arc::new(DisplaySession::restore(next_id(), self.ctx.clone()).await);
            *self.current.write().await = Some(session.clone());
            if self.stopping.load(Ordering::SeqCst) {
                session.destroy().await;
                break;
            }

            let span = info_span!("session", session_id = session.id());
            let exit = run_session(session.clone()).instrument(span).await;
            session.destroy().await;
            // Routes see no session until the replacement is restored.
            *self.current.write().await = None;

            match exit {
                SessionExit::Shutdown => break,
                SessionExit::ReloadRequested => {
                    rebuilds += 1;
                    info!(rebuilds, "rebuilding session from storage");
                }
            }
        }
        *self.current.write().await = None;
    }

    pub async fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(session) = self.current().await {
            session.destroy().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DrawHeader;
    use crate::interface_adapters::channel::{BroadcastChannel, StoragePollingChannel};
    use crate::interface_adapters::storage::MemoryStore;
    use crate::use_cases::reset::{HardReload, SoftResync};
    use crate::use_cases::test_support::{
        ManualClock, RecordingChannel, RecordingRenderer, RecordingStore, ScriptedTimeSource,
        StalledTimeSource, StaticDrawSource, sample_at,
    };
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;
    use tokio::time::timeout;

    const NOW: i64 = 1_700_000_000_000;

    struct Harness {
        clock: Arc<ManualClock>,
        time_source: Arc<ScriptedTimeSource>,
        draw_source: Arc<StaticDrawSource>,
        shared: RecordingStore,
        channel: Arc<RecordingChannel>,
        renderer: Arc<RecordingRenderer>,
        ctx: SessionContext,
    }

    fn harness(reset_strategy: Arc<dyn CycleResetStrategy>) -> Harness {
        let clock = Arc::new(ManualClock::new(NOW));
        let time_source = Arc::new(ScriptedTimeSource::offline());
        let draw_source = Arc::new(StaticDrawSource::failing(
            crate::domain::SyncError::Transport("offline".to_string()),
        ));
        let shared = RecordingStore::new();
        let channel = Arc::new(RecordingChannel::default());
        let renderer = Arc::new(RecordingRenderer::default());
        let ctx = SessionContext {
            clock: clock.clone(),
            time_source: time_source.clone(),
            draw_source: draw_source.clone(),
            shared_store: Arc::new(shared.clone()),
            channel: channel.clone(),
            renderer: renderer.clone(),
            reset_strategy,
            selection: Arc::new(DrawSelection::new(
                Arc::new(RecordingStore::new()),
                true,
                8,
            )),
            settings: SessionSettings::default(),
        };
        Harness {
            clock,
            time_source,
            draw_source,
            shared,
            channel,
            renderer,
            ctx,
        }
    }

    async fn started(h: &Harness, id: u64) -> DisplaySession {
        let session = DisplaySession::restore(id, h.ctx.clone()).await;
        session.start().await;
        session
    }

    fn header(current_draw_number: u64) -> DrawHeader {
        DrawHeader {
            current_draw_number,
            draw_numbers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn when_time_sync_fails_then_countdown_falls_back_in_range() {
        let h = harness(Arc::new(SoftResync));
        let session = started(&h, 1).await;

        assert!(!session.sync_time().await);
        let outcome = session.tick().await;

        let TickOutcome::Counting { remaining } = outcome else {
            panic!("expected a counting tick, got {outcome:?}");
        };
        assert!(remaining <= 180);
        let frame = h.renderer.last().expect("expected a rendered frame");
        assert_eq!(frame.sync_health, crate::domain::SyncHealth::Stale);
    }

    #[tokio::test]
    async fn when_server_reports_45_seconds_then_snapshot_reads_00_45() {
        let h = harness(Arc::new(SoftResync));
        h.time_source.push(Ok(sample_at(NOW, 45)));
        let session = started(&h, 1).await;

        assert!(session.sync_time().await);
        assert_eq!(
            session.tick().await,
            TickOutcome::Counting { remaining: 45 }
        );

        let frame = h.renderer.last().expect("expected a rendered frame");
        assert_eq!(frame.display, "00:45");
        assert_eq!(frame.urgency, Urgency::Normal);
        assert_eq!(frame.sync_health, crate::domain::SyncHealth::Fresh);
        assert_eq!(frame.upcoming_draws.len(), 10);
        assert_eq!(frame.upcoming_draw_times.len(), 10);
    }

    #[tokio::test]
    async fn when_server_wins_then_draw_base_follows_header() {
        let h = harness(Arc::new(SoftResync));
        h.draw_source.set(Ok(header(100)));
        let session = started(&h, 1).await;

        assert!(session.sync_draws().await);
        assert!(!session.sync_draws().await);

        let draws = session.draws().await;
        assert_eq!(draws.current_draw_number, 100);
        assert_eq!(draws.upcoming_numbers(), (101..=110).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn when_cycle_crosses_zero_then_draw_advances_exactly_once() {
        let h = harness(Arc::new(SoftResync));
        h.draw_source.set(Ok(header(100)));
        h.time_source.push(Ok(sample_at(NOW, 2)));
        let session = started(&h, 1).await;
        session.sync_draws().await;
        session.sync_time().await;

        h.clock.set(NOW + 1_500);
        assert_eq!(
            session.tick().await,
            TickOutcome::CycleReset {
                boundary_ms: NOW + 2_000
            }
        );
        assert_eq!(session.complete_draw(NOW + 2_000).await, Some(101));
        assert_eq!(session.complete_draw(NOW + 2_000).await, None);

        h.clock.set(NOW + 1_600);
        assert_eq!(
            session.tick().await,
            TickOutcome::Counting { remaining: 180 }
        );
        assert_eq!(session.draws().await.current_draw_number, 101);
        assert!(h.channel.published().contains(&ChannelMessage::DrawComplete {
            origin: 1,
            draw_number: 101,
            timestamp: NOW + 1_500,
        }));
    }

    #[tokio::test]
    async fn when_soft_resync_runs_then_session_resumes_without_rewinding() {
        let h = harness(Arc::new(SoftResync));
        h.time_source.push(Ok(sample_at(NOW, 2)));
        let session = Arc::new(started(&h, 1).await);
        session.sync_time().await;

        h.clock.set(NOW + 1_500);
        session.tick().await;
        session.complete_draw(NOW + 2_000).await;
        assert_eq!(session.phase().await, CyclePhase::ResetPending);

        let action = SoftResync.on_cycle_end(&session).await;

        assert_eq!(action, ResetAction::Resumed);
        assert_eq!(session.phase().await, CyclePhase::Running);
        timeout(Duration::from_secs(2), async {
            while h.time_source.calls() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected the resync fetch before timeout");
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The resync must not pull the end back onto the boundary just counted.
        assert_eq!(
            session.timer_state().await.countdown_end_epoch_ms,
            NOW + 182_000
        );
    }

    #[tokio::test]
    async fn when_hard_reload_then_rebuilt_session_keeps_draw_and_selection() {
        let h = harness(Arc::new(HardReload {
            delay: Duration::ZERO,
        }));
        h.draw_source.set(Ok(header(100)));
        h.time_source.push(Ok(sample_at(NOW, 2)));
        let session = Arc::new(started(&h, 1).await);
        session.sync_draws().await;
        session.sync_time().await;
        h.ctx
            .selection
            .set(105, &session.draws().await)
            .await
            .expect("expected selection to succeed");

        h.clock.set(NOW + 1_500);
        session.tick().await;
        session.complete_draw(NOW + 2_000).await;
        let action = h.ctx.reset_strategy.on_cycle_end(&session).await;
        assert_eq!(action, ResetAction::Reload);
        session.destroy().await;

        let rebuilt = started(&h, 2).await;
        let snapshot = rebuilt.snapshot().await;

        assert_eq!(snapshot.current_draw_number, 101);
        assert_eq!(snapshot.selected_draw, Some(105));
        assert_eq!(snapshot.countdown_end_ms, NOW + 182_000);
        assert_eq!(
            h.shared.value(mirror::PREVIOUS_DRAW_KEY),
            Some("101".to_string())
        );
    }

    #[tokio::test]
    async fn when_destroyed_then_late_sync_is_dropped() {
        let h = harness(Arc::new(SoftResync));
        let session = started(&h, 1).await;
        let before = session.timer_state().await;
        h.time_source.push(Ok(sample_at(NOW, 45)));

        session.destroy().await;

        assert!(!session.sync_time().await);
        assert_eq!(session.timer_state().await, before);
        assert_eq!(session.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn when_peer_completes_draw_then_local_boundary_is_not_counted_again() {
        let h = harness(Arc::new(SoftResync));
        h.draw_source.set(Ok(header(100)));
        h.time_source.push(Ok(sample_at(NOW, 2)));
        let session = started(&h, 1).await;
        session.sync_draws().await;
        session.sync_time().await;

        h.clock.set(NOW + 1_000);
        assert_eq!(
            session.tick().await,
            TickOutcome::Counting { remaining: 1 }
        );

        h.clock.set(NOW + 1_200);
        let effect = session
            .apply_peer(ChannelMessage::DrawComplete {
                origin: 99,
                draw_number: 101,
                timestamp: NOW + 1_190,
            })
            .await;
        assert_eq!(effect, PeerEffect::DrawCompleted { draw_number: 101 });

        let outcome = session.tick().await;
        assert_eq!(
            outcome,
            TickOutcome::CycleReset {
                boundary_ms: NOW + 2_000
            }
        );
        assert_eq!(session.complete_draw(NOW + 2_000).await, None);
        assert_eq!(session.draws().await.current_draw_number, 101);
    }

    #[tokio::test]
    async fn when_own_message_comes_back_then_it_is_ignored() {
        let h = harness(Arc::new(SoftResync));
        let session = started(&h, 1).await;
        session.publish_state().await;
        let own = h
            .channel
            .published()
            .pop()
            .expect("expected a published message");

        assert_eq!(session.apply_peer(own).await, PeerEffect::Ignored);
    }

    async fn assert_converges(channel: Arc<dyn StateChannel>) {
        let h = harness(Arc::new(SoftResync));
        let mut ctx = h.ctx.clone();
        ctx.channel = channel.clone();
        h.time_source.push(Ok(sample_at(NOW, 45)));

        let a = DisplaySession::restore(1, ctx.clone()).await;
        let b = DisplaySession::restore(2, ctx).await;
        let mut b_rx = channel.subscribe();
        a.sync_time().await;

        let message = timeout(Duration::from_secs(2), async {
            loop {
                let message = b_rx.recv().await.expect("channel closed");
                if message.origin() == 1 {
                    return message;
                }
            }
        })
        .await
        .expect("expected peer message before timeout");
        assert_eq!(b.apply_peer(message).await, PeerEffect::TimerAdopted);

        let a_view = a.snapshot().await;
        let b_view = b.snapshot().await;
        assert_eq!(b_view.remaining_seconds, 45);
        assert_eq!(b_view.remaining_seconds, a_view.remaining_seconds);
        assert_eq!(b_view.countdown_end_ms, a_view.countdown_end_ms);
        assert_eq!(b_view.next_draw_number, a_view.next_draw_number);
    }

    #[tokio::test]
    async fn when_sessions_share_broadcast_channel_then_they_converge() {
        assert_converges(Arc::new(BroadcastChannel::new("roulette_timer_channel", 16))).await;
    }

    #[tokio::test]
    async fn when_sessions_share_storage_polling_then_they_converge() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        assert_converges(Arc::new(StoragePollingChannel::new(
            "roulette_timer_channel",
            store,
            Duration::from_millis(10),
            16,
        )))
        .await;
    }

    #[tokio::test]
    async fn when_peer_message_arrives_then_run_loop_applies_it() {
        let mut h = harness(Arc::new(SoftResync));
        h.ctx.settings.tick_interval = Duration::from_millis(5);
        let session = Arc::new(DisplaySession::restore(1, h.ctx.clone()).await);
        let task = tokio::spawn(run_session(session.clone()));

        timeout(Duration::from_secs(2), async {
            loop {
                h.channel.inject(ChannelMessage::DrawComplete {
                    origin: 42,
                    draw_number: 555,
                    timestamp: NOW,
                });
                if session.draws().await.current_draw_number == 555 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected peer draw before timeout");

        session.destroy().await;
        let exit = timeout(Duration::from_secs(2), task)
            .await
            .expect("expected run loop to stop")
            .expect("run loop panicked");
        assert_eq!(exit, SessionExit::Shutdown);
    }

    #[tokio::test]
    async fn when_resync_hangs_after_cycle_end_then_ticks_keep_rendering() {
        let mut h = harness(Arc::new(SoftResync));
        let stalled = Arc::new(StalledTimeSource::default());
        h.ctx.time_source = stalled.clone();
        h.ctx.settings.cycle_duration_secs = 2;
        h.ctx.settings.tick_interval = Duration::from_millis(5);
        let session = Arc::new(DisplaySession::restore(1, h.ctx.clone()).await);
        let task = tokio::spawn(run_session(session.clone()));

        timeout(Duration::from_secs(2), async {
            while h.renderer.frames().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected a first frame before timeout");

        h.clock.set(NOW + 2_000);
        timeout(Duration::from_secs(2), async {
            while session.draws().await.current_draw_number != 1 || stalled.calls() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected the cycle to end and a resync to start");

        let rendered = h.renderer.frames().len();
        timeout(Duration::from_secs(2), async {
            while h.renderer.frames().len() < rendered + 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected ticks to render while the resync is pending");
        assert_eq!(session.phase().await, CyclePhase::Running);

        session.destroy().await;
        let exit = timeout(Duration::from_secs(2), task)
            .await
            .expect("expected run loop to stop")
            .expect("run loop panicked");
        assert_eq!(exit, SessionExit::Shutdown);
    }

    static NEXT_TEST_ID: AtomicU64 = AtomicU64::new(1);

    fn next_test_id() -> u64 {
        NEXT_TEST_ID.fetch_add(1, Ordering::Relaxed)
    }

    #[tokio::test]
    async fn when_supervisor_shuts_down_then_session_is_destroyed() {
        let mut h = harness(Arc::new(SoftResync));
        h.ctx.settings.tick_interval = Duration::from_millis(5);
        let supervisor = Arc::new(SessionSupervisor::new(h.ctx.clone()));
        let task = tokio::spawn(supervisor.clone().run(next_test_id));

        timeout(Duration::from_secs(2), async {
            while h.renderer.frames().len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected frames before timeout");

        let session = supervisor.current().await.expect("expected a live session");
        supervisor.shutdown().await;
        timeout(Duration::from_secs(2), task)
            .await
            .expect("expected supervisor to stop")
            .expect("supervisor task panicked");

        assert!(supervisor.current().await.is_none());
        assert_eq!(session.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn when_hard_reload_fires_then_supervisor_rebuilds_with_new_session() {
        let mut h = harness(Arc::new(HardReload {
            delay: Duration::ZERO,
        }));
        h.ctx.settings.cycle_duration_secs = 2;
        h.ctx.settings.tick_interval = Duration::from_millis(5);
        let supervisor = Arc::new(SessionSupervisor::new(h.ctx.clone()));
        let task = tokio::spawn(supervisor.clone().run(next_test_id));

        let first = timeout(Duration::from_secs(2), async {
            loop {
                if let Some(session) = supervisor.current().await
                    && !h.renderer.frames().is_empty()
                {
                    return session;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected a live session before timeout");
        assert_eq!(first.draws().await.current_draw_number, 0);

        h.clock.set(NOW + 2_000);
        let rebuilt = timeout(Duration::from_secs(2), async {
            loop {
                if let Some(session) = supervisor.current().await
                    && session.id() != first.id()
                {
                    return session;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected a rebuilt session before timeout");

        // Let the rebuilt session tick past the boundary it restored.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rebuilt.draws().await.current_draw_number, 1);
        let completions = h
            .channel
            .published()
            .into_iter()
            .filter(|message| matches!(message, ChannelMessage::DrawComplete { .. }))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(first.tick().await, TickOutcome::Idle);

        supervisor.shutdown().await;
        timeout(Duration::from_secs(2), task)
            .await
            .expect("expected supervisor to stop")
            .expect("supervisor task panicked");
    }
}
