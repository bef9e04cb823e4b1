// ── Telemetry polling scheduler ──
//
// Pulls a `MetricSnapshot` from the host on a fixed cadence, records it
// into the rolling history and publishes the result through a `watch`
// channel. Polls are single-flight: a tick that elapses while a poll is
// still running is skipped, never queued.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_core::Stream;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::history::MetricHistory;
use crate::model::MetricSnapshot;
use crate::ports::MetricsSource;

// ── PollerState ─────────────────────────────────────────────────────

/// Lifecycle of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerPhase {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// A poll is in flight.
    Polling,
    /// `stop()` was called; no further updates will be published.
    Stopped,
}

/// Everything consumers observe about live telemetry.
#[derive(Debug, Clone)]
pub struct PollerState {
    pub phase: PollerPhase,
    /// Most recent successful snapshot. Survives failed polls.
    pub snapshot: Option<MetricSnapshot>,
    pub history: MetricHistory,
    /// Message from the most recent failed poll, cleared on success.
    pub error: Option<String>,
    /// True until the first poll settles, whatever its outcome.
    pub loading: bool,
    pub last_updated: Option<DateTime<Utc>>,
    /// Successful polls since start.
    pub polls: u64,
}

impl PollerState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            phase: PollerPhase::Idle,
            snapshot: None,
            history: MetricHistory::new(history_capacity),
            error: None,
            loading: true,
            last_updated: None,
            polls: 0,
        }
    }

    /// A settled state built from previously captured snapshots, oldest
    /// first, as if each had been a successful poll.
    pub fn replay<I>(snapshots: I, history_capacity: usize) -> Self
    where
        I: IntoIterator<Item = MetricSnapshot>,
    {
        let mut state = Self::new(history_capacity);
        for snap in snapshots {
            state.apply_success(snap);
        }
        state.loading = false;
        state
    }

    fn apply_success(&mut self, snap: MetricSnapshot) {
        self.history.record(&snap);
        self.snapshot = Some(snap);
        self.error = None;
        self.last_updated = Some(Utc::now());
        self.polls += 1;
    }
}

// ── MetricsPoller ───────────────────────────────────────────────────

/// Spawns the poll loop.
pub struct MetricsPoller;

impl MetricsPoller {
    /// Start polling `source` immediately, then every `config.poll_interval`
    /// measured from now. Must be called inside a tokio runtime.
    pub fn spawn(source: Arc<dyn MetricsSource>, config: &MonitorConfig) -> PollerHandle {
        let (state, _) = watch::channel(PollerState::new(config.history_capacity));
        let inner = Arc::new(PollerInner {
            state,
            cancel: CancellationToken::new(),
            wake: Notify::new(),
            task: Mutex::new(None),
        });

        let period = config.poll_interval.max(Duration::from_millis(1));
        info!(?period, "starting metrics poller");
        let task = tokio::spawn(poll_loop(Arc::clone(&inner), source, period));
        if let Ok(mut slot) = inner.task.lock() {
            *slot = Some(task);
        }

        PollerHandle { inner }
    }
}

struct PollerInner {
    state: watch::Sender<PollerState>,
    cancel: CancellationToken,
    wake: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Control and observation handle for a running poller.
///
/// Cheaply cloneable. Dropping every handle does not stop the loop; call
/// [`stop()`](Self::stop).
#[derive(Clone)]
pub struct PollerHandle {
    inner: Arc<PollerInner>,
}

impl PollerHandle {
    /// Current state (cloned).
    pub fn state(&self) -> PollerState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.inner.state.subscribe()
    }

    /// State changes as a `Stream`, starting with the current value.
    pub fn into_stream(&self) -> impl Stream<Item = PollerState> + Send + 'static {
        WatchStream::new(self.subscribe())
    }

    /// Poll as soon as possible. If a poll is already in flight, one more
    /// follows right after it.
    pub fn poll_now(&self) {
        self.inner.wake.notify_one();
    }

    /// Stop the loop. Any poll still in flight is abandoned and its
    /// result never published.
    pub fn stop(&self) {
        if self.is_stopped() {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.state.send_modify(|s| s.phase = PollerPhase::Stopped);
        info!("metrics poller stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Stop and wait for the loop task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.inner.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, panicked = e.is_panic(), "poll loop did not exit cleanly");
            }
        }
    }
}

// ── Poll loop ───────────────────────────────────────────────────────

async fn poll_loop(inner: Arc<PollerInner>, source: Arc<dyn MetricsSource>, period: Duration) {
    let start = Instant::now();
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            _ = interval.tick() => {}
            () = inner.wake.notified() => debug!("on-demand poll"),
        }
        poll_once(&inner, source.as_ref()).await;
        // Ticks that fell inside the poll are dropped, not fired late.
        interval.reset_at(next_boundary(start, period, Instant::now()));
    }
    debug!("poll loop exited");
}

/// First `start + k * period` strictly after `now`.
fn next_boundary(start: Instant, period: Duration, now: Instant) -> Instant {
    let elapsed = now.saturating_duration_since(start);
    let periods = elapsed.as_nanos() / period.as_nanos().max(1);
    let k = u32::try_from(periods + 1).unwrap_or(u32::MAX);
    start
        .checked_add(period.saturating_mul(k))
        .unwrap_or(now + period)
}

async fn poll_once(inner: &PollerInner, source: &dyn MetricsSource) {
    inner.state.send_if_modified(|s| {
        if inner.cancel.is_cancelled() {
            return false;
        }
        s.phase = PollerPhase::Polling;
        true
    });

    let result = tokio::select! {
        biased;
        () = inner.cancel.cancelled() => return,
        r = source.get_network_metrics() => r,
    };

    inner.state.send_if_modified(|s| {
        // stop() may have landed between the poll resolving and this closure.
        if inner.cancel.is_cancelled() {
            return false;
        }
        match result {
            Ok(snap) => {
                debug!(
                    connected = snap.wifi.connected,
                    signal_dbm = ?snap.wifi.signal_dbm,
                    "poll succeeded"
                );
                s.apply_success(snap);
            }
            Err(e) => {
                warn!(error = %e, "poll failed");
                s.error = Some(e.to_string());
            }
        }
        s.loading = false;
        s.phase = PollerPhase::Idle;
        true
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::future::BoxFuture;
    use futures_util::{FutureExt, StreamExt};

    use super::*;
    use crate::error::AcquisitionError;
    use crate::history::Channel;
    use crate::model::{InterferenceAnalysis, WifiInfo};

    fn snapshot(signal: i32) -> MetricSnapshot {
        MetricSnapshot {
            wifi: WifiInfo {
                connected: true,
                signal_dbm: Some(signal),
                ..WifiInfo::default()
            },
            ..MetricSnapshot::default()
        }
    }

    /// Replays a script of results, each after `delay`.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<MetricSnapshot, AcquisitionError>>>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(
            script: Vec<Result<MetricSnapshot, AcquisitionError>>,
            delay: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                delay,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    impl MetricsSource for ScriptedSource {
        fn get_network_metrics(&self) -> BoxFuture<'_, Result<MetricSnapshot, AcquisitionError>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.script
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Ok(snapshot(-50)))
            }
            .boxed()
        }

        fn check_interference(
            &self,
        ) -> BoxFuture<'_, Result<InterferenceAnalysis, AcquisitionError>> {
            async { Err(AcquisitionError::new("not scanned")) }.boxed()
        }
    }

    fn config() -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(3),
            history_capacity: 30,
            ..MonitorConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_immediately_then_on_interval() {
        let source = ScriptedSource::new(vec![], Duration::ZERO);
        let handle = MetricsPoller::spawn(source.clone(), &config());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = handle.state();
        assert!(!state.loading);
        assert_eq!(state.polls, 1);
        assert_eq!(state.phase, PollerPhase::Idle);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(handle.state().polls, 3);

        handle.shutdown().await;
        assert_eq!(handle.state().phase, PollerPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn three_polls_record_signal_magnitudes() {
        let source = ScriptedSource::new(
            vec![Ok(snapshot(-50)), Ok(snapshot(-65)), Ok(snapshot(-90))],
            Duration::ZERO,
        );
        let handle = MetricsPoller::spawn(source, &config());

        tokio::time::sleep(Duration::from_millis(6_100)).await;
        handle.stop();

        let state = handle.state();
        assert_eq!(state.history.snapshot(Channel::Signal), vec![50.0, 65.0, 90.0]);
        let statuses: Vec<_> = state
            .history
            .snapshot(Channel::Signal)
            .into_iter()
            .map(|v| crate::status::classify_channel(Channel::Signal, v))
            .collect();
        assert_eq!(
            statuses,
            vec![
                crate::status::HealthStatus::Good,
                crate::status::HealthStatus::Warning,
                crate::status::HealthStatus::Bad,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_last_good_snapshot() {
        let source = ScriptedSource::new(
            vec![
                Ok(snapshot(-55)),
                Err(AcquisitionError::new("airport utility missing")),
                Ok(snapshot(-70)),
            ],
            Duration::ZERO,
        );
        let handle = MetricsPoller::spawn(source, &config());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.state().history.len(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let state = handle.state();
        assert_eq!(state.error.as_deref(), Some("airport utility missing"));
        assert_eq!(state.snapshot.map(|s| s.wifi.signal_dbm), Some(Some(-55)));
        assert_eq!(state.history.len(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let state = handle.state();
        assert_eq!(state.error, None);
        assert_eq!(state.snapshot.map(|s| s.wifi.signal_dbm), Some(Some(-70)));
        assert_eq!(state.history.snapshot(Channel::Signal), vec![55.0, 70.0]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_failure_still_settles_loading() {
        let source = ScriptedSource::new(
            vec![Err(AcquisitionError::new("no interface"))],
            Duration::ZERO,
        );
        let handle = MetricsPoller::spawn(source, &config());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = handle.state();
        assert!(!state.loading);
        assert!(state.snapshot.is_none());
        assert!(state.history.is_empty());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_in_flight_poll() {
        let source = ScriptedSource::new(vec![Ok(snapshot(-40))], Duration::from_secs(5));
        let handle = MetricsPoller::spawn(source.clone(), &config());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state().phase, PollerPhase::Polling);
        handle.stop();

        tokio::time::sleep(Duration::from_secs(10)).await;
        let state = handle.state();
        assert_eq!(state.phase, PollerPhase::Stopped);
        assert!(state.snapshot.is_none());
        assert!(state.history.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_polls_never_overlap() {
        let source = ScriptedSource::new(vec![], Duration::from_secs(7));
        let handle = MetricsPoller::spawn(source.clone(), &config());

        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.shutdown().await;

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        let calls = source.calls.load(Ordering::SeqCst);
        // One 7s poll per 9s boundary: starts at 0, 9, 18, 27.
        assert_eq!(calls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_now_triggers_extra_poll() {
        let source = ScriptedSource::new(vec![], Duration::ZERO);
        let handle = MetricsPoller::spawn(source.clone(), &config());

        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.poll_now();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(handle.state().polls, 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stream_yields_updates() {
        let source = ScriptedSource::new(vec![], Duration::ZERO);
        let handle = MetricsPoller::spawn(source, &config());

        let mut stream = Box::pin(handle.into_stream());
        let settled = loop {
            let state = stream.next().await.unwrap();
            if !state.loading {
                break state;
            }
        };
        assert_eq!(settled.polls, 1);
        handle.shutdown().await;
    }

    struct PanickingSource;

    impl MetricsSource for PanickingSource {
        fn get_network_metrics(&self) -> BoxFuture<'_, Result<MetricSnapshot, AcquisitionError>> {
            panic!("collector crashed")
        }

        fn check_interference(
            &self,
        ) -> BoxFuture<'_, Result<InterferenceAnalysis, AcquisitionError>> {
            async { Err(AcquisitionError::new("not scanned")) }.boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_survives_a_panicked_loop() {
        let handle = MetricsPoller::spawn(Arc::new(PanickingSource), &config());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_stopped());

        handle.shutdown().await;
        assert!(handle.is_stopped());
        assert_eq!(handle.state().phase, PollerPhase::Stopped);
        assert!(handle.state().snapshot.is_none());

        // Second shutdown finds no task left to join.
        handle.shutdown().await;
    }

    #[test]
    fn boundaries_stay_anchored_to_start() {
        let start = Instant::now();
        let period = Duration::from_secs(3);
        assert_eq!(next_boundary(start, period, start), start + period);
        assert_eq!(
            next_boundary(start, period, start + Duration::from_secs(7)),
            start + Duration::from_secs(9)
        );
        assert_eq!(
            next_boundary(start, period, start + Duration::from_secs(9)),
            start + Duration::from_secs(12)
        );
    }

    #[test]
    fn replay_builds_settled_state() {
        let state = PollerState::replay([snapshot(-60), snapshot(-61)], 30);
        assert!(!state.loading);
        assert_eq!(state.polls, 2);
        assert_eq!(state.history.snapshot(Channel::Signal), vec![60.0, 61.0]);
    }
}
