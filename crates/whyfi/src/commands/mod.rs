//! Command dispatch: bridges CLI args -> orchestrator tasks -> output formatting.

pub mod config_cmd;
pub mod diagnose;
pub mod interference;
pub mod key;
pub mod speedtest;
pub mod watch;

use whyfi_core::{Orchestrator, OrchestratorState, TaskKind, TaskView};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Speedtest => speedtest::handle(global).await,
        Command::Diagnose(args) => diagnose::handle(args, global).await,
        Command::Interference(args) => interference::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Key(args) => key::handle(args, global),
        Command::Config(args) => config_cmd::handle(args, global),
    }
}

// ── Task completion ─────────────────────────────────────────────────

/// Wait for a started task to settle.
///
/// `progress` sees every published state while the task runs. Ctrl-C
/// clears the task and returns [`CliError::Interrupted`]. The inner
/// `Err` is the task's own error message.
pub async fn await_task<T, V, P>(
    orch: &Orchestrator,
    kind: TaskKind,
    view: V,
    mut progress: P,
) -> Result<Result<T, String>, CliError>
where
    T: Clone,
    V: Fn(&OrchestratorState) -> &TaskView<T>,
    P: FnMut(&OrchestratorState),
{
    let mut rx = orch.subscribe();
    loop {
        {
            let state = rx.borrow_and_update();
            let task = view(&*state);
            if !task.loading {
                return match (&task.result, &task.error) {
                    (Some(result), _) => Ok(Ok(result.clone())),
                    (None, Some(error)) => Ok(Err(error.clone())),
                    (None, None) => Err(CliError::Interrupted),
                };
            }
            progress(&*state);
        }

        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                clear(orch, kind);
                return Err(CliError::Interrupted);
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    return Err(CliError::Interrupted);
                }
            }
        }
    }
}

fn clear(orch: &Orchestrator, kind: TaskKind) {
    match kind {
        TaskKind::Interference => orch.clear_interference(),
        TaskKind::SpeedTest => orch.clear_speed_test(),
        TaskKind::Diagnosis => orch.clear_diagnosis(),
    }
}

/// `-` for a missing value, otherwise the value with its unit.
pub fn fmt_opt(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.1} {unit}"))
}
