// ── Diagnostic task orchestrator ──
//
// Coordinates the three on-demand tasks (interference scan, speed test,
// AI diagnosis). At most one runs at a time. Each task's result lives in
// its own `TaskView`; `ActivePanel` decides which one is surfaced.
//
// Every start bumps the task's generation. Spawned work carries the
// generation it was started with and its completion is dropped when that
// no longer matches, so a cleared or restarted task is never resurrected
// by a late reply.

use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use strum::Display;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::diagnosis::{DiagnosisEngine, DiagnosisInput};
use crate::error::CoreError;
use crate::model::{DiagnosisResult, InterferenceAnalysis, SpeedTestResult};
use crate::poller::{PollerHandle, PollerState};
use crate::ports::Ports;
use crate::speedtest::{PhaseKind, SpeedTestError, SpeedTestPipeline};

const STATUS_INITIALIZING: &str = "Initializing...";
const STATUS_STARTING: &str = "Starting test...";
const STATUS_PROCESSING: &str = "Processing results...";

// ── Public state ────────────────────────────────────────────────────

/// The on-demand tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TaskKind {
    #[strum(to_string = "Interference scan")]
    Interference,
    #[strum(to_string = "Speed test")]
    SpeedTest,
    #[strum(to_string = "AI diagnosis")]
    Diagnosis,
}

/// Result, error and loading flag of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView<T> {
    pub result: Option<T>,
    pub error: Option<String>,
    pub loading: bool,
}

impl<T> Default for TaskView<T> {
    fn default() -> Self {
        Self {
            result: None,
            error: None,
            loading: false,
        }
    }
}

impl<T> TaskView<T> {
    fn is_blank(&self) -> bool {
        self.result.is_none() && self.error.is_none()
    }
}

/// What the user is currently looking at. Exactly one at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActivePanel {
    #[default]
    None,
    Interference(Option<InterferenceAnalysis>),
    SpeedTest(Option<SpeedTestResult>),
    Diagnosis(Option<DiagnosisResult>),
    Settings,
}

impl ActivePanel {
    /// The task this panel belongs to, if any.
    pub fn task(&self) -> Option<TaskKind> {
        match self {
            Self::Interference(_) => Some(TaskKind::Interference),
            Self::SpeedTest(_) => Some(TaskKind::SpeedTest),
            Self::Diagnosis(_) => Some(TaskKind::Diagnosis),
            Self::None | Self::Settings => None,
        }
    }
}

/// Outcome of a `start_*` call that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStart {
    Started,
    /// The same task was already running; nothing changed.
    AlreadyRunning,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u64,
    /// Cleared while running: the in-flight completion only drops loading.
    discard: bool,
    cancel: Option<CancellationToken>,
}

/// Everything consumers observe about the on-demand tasks.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorState {
    pub interference: TaskView<InterferenceAnalysis>,
    pub speed_test: TaskView<SpeedTestResult>,
    /// Progress line for the running speed test, empty when idle.
    pub speed_status: String,
    pub diagnosis: TaskView<DiagnosisResult>,
    pub panel: ActivePanel,
    running: Option<TaskKind>,
    slots: [Slot; 3],
}

impl OrchestratorState {
    pub fn running(&self) -> Option<TaskKind> {
        self.running
    }

    /// Whether task controls should be enabled (no task in flight).
    pub fn controls_enabled(&self) -> bool {
        self.running.is_none()
    }

    fn slot(&self, kind: TaskKind) -> &Slot {
        &self.slots[slot_index(kind)]
    }

    fn slot_mut(&mut self, kind: TaskKind) -> &mut Slot {
        &mut self.slots[slot_index(kind)]
    }

    fn is_current(&self, kind: TaskKind, generation: u64) -> bool {
        self.slot(kind).generation == generation
    }

    fn reset_view(&mut self, kind: TaskKind) {
        match kind {
            TaskKind::Interference => self.interference = TaskView::default(),
            TaskKind::SpeedTest => self.speed_test = TaskView::default(),
            TaskKind::Diagnosis => self.diagnosis = TaskView::default(),
        }
    }

    fn set_loading(&mut self, kind: TaskKind, loading: bool) {
        match kind {
            TaskKind::Interference => self.interference.loading = loading,
            TaskKind::SpeedTest => self.speed_test.loading = loading,
            TaskKind::Diagnosis => self.diagnosis.loading = loading,
        }
    }

    fn is_loading(&self, kind: TaskKind) -> bool {
        match kind {
            TaskKind::Interference => self.interference.loading,
            TaskKind::SpeedTest => self.speed_test.loading,
            TaskKind::Diagnosis => self.diagnosis.loading,
        }
    }

    fn is_blank(&self, kind: TaskKind) -> bool {
        match kind {
            TaskKind::Interference => self.interference.is_blank(),
            TaskKind::SpeedTest => self.speed_test.is_blank(),
            TaskKind::Diagnosis => self.diagnosis.is_blank(),
        }
    }

    /// Mirror the task's current result into the panel if it is showing.
    fn refresh_panel(&mut self, kind: TaskKind) {
        if self.panel.task() != Some(kind) {
            return;
        }
        self.panel = match kind {
            TaskKind::Interference => ActivePanel::Interference(self.interference.result.clone()),
            TaskKind::SpeedTest => ActivePanel::SpeedTest(self.speed_test.result),
            TaskKind::Diagnosis => ActivePanel::Diagnosis(self.diagnosis.result.clone()),
        };
    }

    fn show(&mut self, kind: TaskKind) {
        self.panel = match kind {
            TaskKind::Interference => ActivePanel::Interference(None),
            TaskKind::SpeedTest => ActivePanel::SpeedTest(None),
            TaskKind::Diagnosis => ActivePanel::Diagnosis(None),
        };
        self.refresh_panel(kind);
    }

    fn hide(&mut self, kind: TaskKind) {
        if self.panel.task() == Some(kind) {
            self.panel = ActivePanel::None;
        }
    }
}

fn slot_index(kind: TaskKind) -> usize {
    match kind {
        TaskKind::Interference => 0,
        TaskKind::SpeedTest => 1,
        TaskKind::Diagnosis => 2,
    }
}

// ── Orchestrator ────────────────────────────────────────────────────

struct OrchestratorInner {
    config: MonitorConfig,
    ports: Ports,
    engine: DiagnosisEngine,
    state: watch::Sender<OrchestratorState>,
    telemetry: Mutex<Option<watch::Receiver<PollerState>>>,
}

/// Starts, tracks and clears the on-demand tasks.
///
/// Cheaply cloneable. Task work is spawned onto the current tokio runtime.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    pub fn new(config: MonitorConfig, ports: Ports) -> Self {
        let engine = DiagnosisEngine::new(
            Arc::clone(&ports.completion),
            config.model.clone(),
            config.prompt_samples,
        );
        let (state, _) = watch::channel(OrchestratorState::default());
        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                ports,
                engine,
                state,
                telemetry: Mutex::new(None),
            }),
        }
    }

    /// Feed diagnoses from a running poller.
    pub fn attach_poller(&self, poller: &PollerHandle) {
        self.attach_telemetry(poller.subscribe());
    }

    /// Feed diagnoses from any source of `PollerState`.
    pub fn attach_telemetry(&self, rx: watch::Receiver<PollerState>) {
        if let Ok(mut slot) = self.inner.telemetry.lock() {
            *slot = Some(rx);
        }
    }

    /// Current state (cloned).
    pub fn state(&self) -> OrchestratorState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.inner.state.subscribe()
    }

    /// Resolve once no task is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        if rx.wait_for(|s| s.running.is_none()).await.is_err() {
            debug!("state channel closed while waiting for idle");
        }
    }

    // ── Admission ──

    /// Whether `kind` may start now. `Ok(false)` means it is already running.
    fn admit(&self, kind: TaskKind) -> Result<bool, CoreError> {
        match self.inner.state.borrow().running {
            None => Ok(true),
            Some(running) if running == kind => Ok(false),
            Some(running) => Err(CoreError::TaskBusy { running }),
        }
    }

    /// Claim the running slot for `kind`, returning the new generation.
    fn begin(
        &self,
        kind: TaskKind,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<u64>, CoreError> {
        let mut outcome = Ok(None);
        self.inner.state.send_if_modified(|s| match s.running {
            Some(running) if running == kind => false,
            Some(running) => {
                outcome = Err(CoreError::TaskBusy { running });
                false
            }
            None => {
                let slot = s.slot_mut(kind);
                slot.generation += 1;
                slot.discard = false;
                slot.cancel = cancel;
                outcome = Ok(Some(slot.generation));

                s.running = Some(kind);
                s.reset_view(kind);
                s.set_loading(kind, true);
                s.show(kind);
                if kind == TaskKind::SpeedTest {
                    s.speed_status = STATUS_INITIALIZING.into();
                }
                true
            }
        });
        if let Err(CoreError::TaskBusy { running }) = &outcome {
            debug!(requested = %kind, %running, "task rejected");
        }
        outcome
    }

    /// Apply a completion if its generation is still current.
    fn finish<F>(&self, kind: TaskKind, generation: u64, apply: F)
    where
        F: FnOnce(&mut OrchestratorState),
    {
        self.inner.state.send_if_modified(|s| {
            if !s.is_current(kind, generation) {
                debug!(task = %kind, generation, "stale completion dropped");
                return false;
            }
            let discard = s.slot(kind).discard;
            if !discard {
                apply(s);
            }
            let slot = s.slot_mut(kind);
            slot.discard = false;
            slot.cancel = None;
            s.set_loading(kind, false);
            if s.running == Some(kind) {
                s.running = None;
            }
            s.refresh_panel(kind);
            true
        });
    }

    // ── Interference ──

    pub fn start_interference(&self) -> Result<TaskStart, CoreError> {
        let Some(generation) = self.begin(TaskKind::Interference, None)? else {
            return Ok(TaskStart::AlreadyRunning);
        };
        info!(generation, "starting interference scan");

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.inner.ports.metrics.check_interference().await;
            this.finish(TaskKind::Interference, generation, |s| match result {
                Ok(analysis) => {
                    info!(level = %analysis.interference_level, "interference scan complete");
                    s.interference.result = Some(analysis);
                }
                Err(e) => {
                    warn!(error = %e, "interference scan failed");
                    s.interference.error = Some(e.to_string());
                }
            });
        });
        Ok(TaskStart::Started)
    }

    /// Discard the scan result. An in-flight scan keeps running but its
    /// result is dropped.
    pub fn clear_interference(&self) {
        self.clear_detached(TaskKind::Interference);
    }

    // ── Speed test ──

    pub fn start_speed_test(&self) -> Result<TaskStart, CoreError> {
        let cancel = CancellationToken::new();
        let Some(generation) = self.begin(TaskKind::SpeedTest, Some(cancel.clone()))? else {
            return Ok(TaskStart::AlreadyRunning);
        };
        info!(generation, "starting speed test");

        let this = self.clone();
        tokio::spawn(async move {
            this.set_speed_status(generation, STATUS_STARTING);

            let progress = {
                let this = this.clone();
                move |phase: PhaseKind| {
                    this.set_speed_status(generation, phase.status_line());
                }
            };
            let result = SpeedTestPipeline::run(
                this.inner.ports.speed.as_ref(),
                &this.inner.config.speed_plan,
                progress,
                &cancel,
            )
            .await;

            match result {
                Err(SpeedTestError::Cancelled) => {
                    debug!(generation, "speed test paused");
                }
                Ok(summary) => {
                    this.set_speed_status(generation, STATUS_PROCESSING);
                    this.finish(TaskKind::SpeedTest, generation, |s| {
                        s.speed_test.result = Some(summary);
                        s.speed_status.clear();
                    });
                }
                Err(e) => {
                    warn!(error = %e, "speed test failed");
                    this.finish(TaskKind::SpeedTest, generation, |s| {
                        s.speed_test.error = Some(e.to_string());
                        s.speed_status.clear();
                    });
                }
            }
        });
        Ok(TaskStart::Started)
    }

    fn set_speed_status(&self, generation: u64, status: &str) {
        self.inner.state.send_if_modified(|s| {
            if !s.is_current(TaskKind::SpeedTest, generation) || !s.speed_test.loading {
                return false;
            }
            s.speed_status = status.to_owned();
            true
        });
    }

    /// Pause any running speed test and discard its result. Nothing from
    /// the paused run is published afterwards.
    pub fn clear_speed_test(&self) {
        self.inner.state.send_if_modified(|s| {
            let running = s.running == Some(TaskKind::SpeedTest);
            if !running && s.is_blank(TaskKind::SpeedTest) && !s.is_loading(TaskKind::SpeedTest) {
                return false;
            }
            let slot = s.slot_mut(TaskKind::SpeedTest);
            if let Some(cancel) = slot.cancel.take() {
                cancel.cancel();
                info!("speed test paused");
            }
            slot.generation += 1;
            slot.discard = false;

            if running {
                s.running = None;
            }
            s.reset_view(TaskKind::SpeedTest);
            s.speed_status.clear();
            s.hide(TaskKind::SpeedTest);
            true
        });
    }

    // ── AI diagnosis ──

    /// Whether a credential is configured.
    pub fn diagnosis_available(&self) -> bool {
        self.inner
            .ports
            .settings
            .load()
            .is_ok_and(|s| s.has_api_key())
    }

    pub fn start_diagnosis(&self) -> Result<TaskStart, CoreError> {
        if !self.admit(TaskKind::Diagnosis)? {
            return Ok(TaskStart::AlreadyRunning);
        }
        let settings = self.inner.ports.settings.load()?;
        if !settings.has_api_key() {
            return Err(CoreError::MissingApiKey);
        }
        let Some(api_key) = settings.api_key else {
            return Err(CoreError::MissingApiKey);
        };

        let Some(generation) = self.begin(TaskKind::Diagnosis, None)? else {
            return Ok(TaskStart::AlreadyRunning);
        };
        let input = self.diagnosis_input();
        info!(generation, samples = input.history.len(), "starting AI diagnosis");

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.inner.engine.diagnose(&api_key, &input).await;
            this.finish(TaskKind::Diagnosis, generation, |s| match result {
                Ok(report) => s.diagnosis.result = Some(report),
                Err(e) => s.diagnosis.error = Some(e.to_string()),
            });
        });
        Ok(TaskStart::Started)
    }

    /// Latest telemetry plus whatever scan and speed results are held.
    fn diagnosis_input(&self) -> DiagnosisInput {
        let telemetry = self
            .inner
            .telemetry
            .lock()
            .ok()
            .and_then(|rx| rx.as_ref().map(|rx| rx.borrow().clone()));
        let state = self.inner.state.borrow();

        let (snapshot, history) = match telemetry {
            Some(t) => (t.snapshot, t.history),
            None => (
                None,
                crate::history::MetricHistory::new(self.inner.config.history_capacity),
            ),
        };
        DiagnosisInput {
            snapshot,
            history,
            interference: state.interference.result.clone(),
            speed_test: state.speed_test.result,
        }
    }

    /// Discard the diagnosis. An in-flight request keeps running but its
    /// reply is dropped.
    pub fn clear_diagnosis(&self) {
        self.clear_detached(TaskKind::Diagnosis);
    }

    fn clear_detached(&self, kind: TaskKind) {
        self.inner.state.send_if_modified(|s| {
            let running = s.running == Some(kind);
            let already_discarding = s.slot(kind).discard;
            let showing = s.panel.task() == Some(kind);
            if s.is_blank(kind) && !showing && (!running || already_discarding) {
                return false;
            }
            if running {
                s.slot_mut(kind).discard = true;
            }
            let loading = s.is_loading(kind);
            s.reset_view(kind);
            s.set_loading(kind, loading);
            s.hide(kind);
            debug!(task = %kind, running, "task result cleared");
            true
        });
    }

    // ── Settings ──

    pub fn open_settings(&self) {
        self.inner.state.send_if_modified(|s| {
            if s.panel == ActivePanel::Settings {
                return false;
            }
            s.panel = ActivePanel::Settings;
            true
        });
    }

    pub fn close_settings(&self) {
        self.inner.state.send_if_modified(|s| {
            if s.panel != ActivePanel::Settings {
                return false;
            }
            s.panel = ActivePanel::None;
            true
        });
    }

    /// Store a credential. A blank key removes it.
    pub fn save_api_key(&self, key: SecretString) -> Result<(), CoreError> {
        let store = &self.inner.ports.settings;
        let mut settings = store.load()?;
        settings.api_key = Some(key);
        if !settings.has_api_key() {
            settings.api_key = None;
        }
        store.save(&settings)?;
        info!(configured = settings.api_key.is_some(), "API key updated");
        Ok(())
    }

    pub fn clear_api_key(&self) -> Result<(), CoreError> {
        let store = &self.inner.ports.settings;
        let mut settings = store.load()?;
        if settings.api_key.take().is_some() {
            store.save(&settings)?;
            info!("API key removed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("running", &self.inner.state.borrow().running)
            .finish_non_exhaustive()
    }
}
