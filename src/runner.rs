use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RunSettings;
use crate::dashboard::{Dashboard, RunSession};
use crate::models::{LogEntry, LogKind, RunResults};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("conexão recusada na etapa {step} ({stage})")]
    Rejected { step: usize, stage: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Log(LogEntry),
    Progress(u8),
    Results(RunResults),
    Failed(RunError),
    Finished(RunSession),
}

#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub kind: LogKind,
    pub message: &'static str,
    pub progress: u8,
    pub delay_after: Duration,
}

/// The scripted automation: a fixed list of steps, then the fixed results.
#[derive(Debug, Clone)]
pub struct RunScript {
    pub steps: Vec<ScriptStep>,
    /// 1-based step at which the run rejects instead of logging.
    pub fail_at: Option<usize>,
}

const STEPS: [(LogKind, &str, u8); 5] = [
    (LogKind::Info, "Configurando credenciais...", 10),
    (LogKind::Info, "Conectando às plataformas...", 25),
    (LogKind::Info, "Buscando vagas no LinkedIn...", 50),
    (LogKind::Info, "Aplicando filtros de busca...", 75),
    (LogKind::Success, "Processo concluído com sucesso!", 100),
];

impl RunScript {
    pub fn standard(settings: &RunSettings) -> Self {
        let steps = STEPS
            .iter()
            .enumerate()
            .map(|(i, (kind, message, progress))| ScriptStep {
                kind: *kind,
                message: *message,
                progress: *progress,
                delay_after: settings
                    .step_delays_ms
                    .get(i)
                    .map(|ms| Duration::from_millis(*ms))
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            steps,
            fail_at: None,
        }
    }

    pub fn failing_at(mut self, step: usize) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.delay_after).sum()
    }
}

enum Outcome {
    Done(RunResults),
    Rejected(RunError),
    Cancelled,
}

async fn run_steps(
    script: &RunScript,
    tx: &UnboundedSender<RunEvent>,
    cancel: &CancellationToken,
) -> Outcome {
    let last = script.steps.len();
    for (i, step) in script.steps.iter().enumerate() {
        let number = i + 1;
        if script.fail_at == Some(number) {
            return Outcome::Rejected(RunError::Rejected {
                step: number,
                stage: step.message.trim_end_matches("...").to_lowercase(),
            });
        }

        debug!(step = number, progress = step.progress, "run step");
        let _ = tx.send(RunEvent::Log(LogEntry::now(step.kind, step.message)));
        let _ = tx.send(RunEvent::Progress(step.progress));

        if number == last || step.delay_after.is_zero() {
            continue;
        }
        tokio::select! {
            _ = cancel.cancelled() => return Outcome::Cancelled,
            _ = tokio::time::sleep(step.delay_after) => {}
        }
    }
    Outcome::Done(RunResults::simulated())
}

/// Play a script to completion, reporting everything through `tx`.
/// Always ends with `RunEvent::Finished` carrying `session`.
pub async fn play(
    script: RunScript,
    session: RunSession,
    tx: UnboundedSender<RunEvent>,
    cancel: CancellationToken,
) {
    match run_steps(&script, &tx, &cancel).await {
        Outcome::Done(results) => {
            info!(
                jobs = results.total_jobs,
                applications = results.total_applications,
                session = %session.id,
                "run completed"
            );
            let _ = tx.send(RunEvent::Results(results));
        }
        Outcome::Rejected(err) => {
            warn!(error = %err, session = %session.id, "run rejected");
            let _ = tx.send(RunEvent::Failed(err));
        }
        Outcome::Cancelled => {
            info!(session = %session.id, "run cancelled");
        }
    }
    let _ = tx.send(RunEvent::Finished(session));
}

/// Starts and stops simulated runs on behalf of a [`Dashboard`].
pub struct RunController {
    runtime: Handle,
    settings: RunSettings,
    tx: UnboundedSender<RunEvent>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    fail_at: Option<usize>,
}

impl RunController {
    pub fn new(runtime: Handle, settings: RunSettings) -> (Self, UnboundedReceiver<RunEvent>) {
        let (tx, rx) = unbounded_channel();
        let controller = Self {
            runtime,
            settings,
            tx,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            fail_at: None,
        };
        (controller, rx)
    }

    pub fn inject_failure(&mut self, step: Option<usize>) {
        self.fail_at = step;
    }

    /// Reset the dashboard for a new run and spawn the script.
    /// A run already in flight is left alone.
    pub fn start(&mut self, dashboard: &mut Dashboard) {
        let session = dashboard.begin_run();

        let mut script = RunScript::standard(&self.settings);
        if let Some(step) = self.fail_at {
            script = script.failing_at(step);
        }

        self.tasks.retain(|t| !t.is_finished());
        if !self.tasks.is_empty() {
            warn!(in_flight = self.tasks.len(), "starting a run while another is in flight");
        }

        info!(duration = ?script.total_duration(), fail_at = ?script.fail_at, "spawning run");
        let tx = self.tx.clone();
        let cancel = self.cancel.child_token();
        self.tasks.push(self.runtime.spawn(play(script, session, tx, cancel)));
    }

    /// Clear the running flag. Pending steps keep firing unless
    /// `cancel_on_stop` is configured.
    pub fn stop(&mut self, dashboard: &mut Dashboard) {
        dashboard.stop();
        if self.settings.cancel_on_stop {
            self.cancel.cancel();
            self.cancel = CancellationToken::new();
        }
    }

    pub fn in_flight(&mut self) -> usize {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RunSettings {
        RunSettings::default()
    }

    fn drain(rx: &mut UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn progress_of(events: &[RunEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_standard_script_shape() {
        let script = RunScript::standard(&settings());
        assert_eq!(script.steps.len(), 5);
        let progress: Vec<u8> = script.steps.iter().map(|s| s.progress).collect();
        assert_eq!(progress, vec![10, 25, 50, 75, 100]);
        assert_eq!(script.steps[4].kind, LogKind::Success);
        assert_eq!(script.total_duration(), Duration::from_millis(5500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_full_sequence() {
        let (tx, mut rx) = unbounded_channel();
        let session = RunSession::new();
        play(RunScript::standard(&settings()), session.clone(), tx, CancellationToken::new()).await;

        let events = drain(&mut rx);
        assert_eq!(progress_of(&events), vec![10, 25, 50, 75, 100]);
        let logs = events.iter().filter(|e| matches!(e, RunEvent::Log(_))).count();
        assert_eq!(logs, 5);
        assert!(matches!(&events[events.len() - 2], RunEvent::Results(r) if r.total_jobs == 15));
        assert_eq!(events.last(), Some(&RunEvent::Finished(session)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_is_paced_by_delays() {
        let (tx, mut rx) = unbounded_channel();
        let task = tokio::spawn(play(
            RunScript::standard(&settings()),
            RunSession::new(),
            tx,
            CancellationToken::new(),
        ));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(progress_of(&drain(&mut rx)), vec![10, 25]);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(progress_of(&drain(&mut rx)), vec![50]);

        task.await.unwrap();
        let rest = drain(&mut rx);
        assert_eq!(progress_of(&rest), vec![75, 100]);
        assert!(matches!(rest.last(), Some(RunEvent::Finished(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_rejection_skips_results() {
        let (tx, mut rx) = unbounded_channel();
        let script = RunScript::standard(&settings()).failing_at(3);
        play(script, RunSession::new(), tx, CancellationToken::new()).await;

        let events = drain(&mut rx);
        assert_eq!(progress_of(&events), vec![10, 25]);
        assert!(!events.iter().any(|e| matches!(e, RunEvent::Results(_))));
        let failed = events.iter().find_map(|e| match e {
            RunEvent::Failed(err) => Some(err.clone()),
            _ => None,
        });
        let err = failed.expect("rejection reported");
        assert_eq!(err.to_string(), "conexão recusada na etapa 3 (buscando vagas no linkedin)");
        assert!(matches!(events.last(), Some(RunEvent::Finished(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_cancelled_mid_delay() {
        let (tx, mut rx) = unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(play(RunScript::standard(&settings()), RunSession::new(), tx, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
        task.await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(progress_of(&events), vec![10]);
        assert!(!events.iter().any(|e| matches!(e, RunEvent::Results(_) | RunEvent::Failed(_))));
        assert!(matches!(events.last(), Some(RunEvent::Finished(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_does_not_cancel_by_default() {
        let (mut controller, mut rx) = RunController::new(Handle::current(), settings());
        let mut dashboard = Dashboard::default();

        controller.start(&mut dashboard);
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.stop(&mut dashboard);
        assert!(!dashboard.running);

        tokio::time::sleep(Duration::from_secs(10)).await;
        for event in drain(&mut rx) {
            dashboard.apply(event);
        }
        assert_eq!(dashboard.progress, 100);
        assert_eq!(dashboard.results.total_jobs, 15);
        assert!(!dashboard.running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_when_configured() {
        let settings = RunSettings {
            cancel_on_stop: true,
            ..RunSettings::default()
        };
        let (mut controller, mut rx) = RunController::new(Handle::current(), settings);
        let mut dashboard = Dashboard::default();

        controller.start(&mut dashboard);
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.stop(&mut dashboard);

        tokio::time::sleep(Duration::from_secs(10)).await;
        for event in drain(&mut rx) {
            dashboard.apply(event);
        }
        assert_eq!(dashboard.progress, 10);
        assert_eq!(dashboard.results.total_jobs, 0);
        assert_eq!(controller.in_flight(), 0);

        // a fresh run after the cancel is not affected by it
        controller.start(&mut dashboard);
        tokio::time::sleep(Duration::from_secs(10)).await;
        for event in drain(&mut rx) {
            dashboard.apply(event);
        }
        assert_eq!(dashboard.progress, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_yields_two_distinct_summaries() {
        let (mut controller, mut rx) = RunController::new(Handle::current(), settings());
        let mut dashboard = Dashboard::default();

        controller.start(&mut dashboard);
        tokio::time::sleep(Duration::from_millis(300)).await;
        controller.start(&mut dashboard);
        assert_eq!(controller.in_flight(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let summaries: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| dashboard.apply(event))
            .collect();

        assert_eq!(summaries.len(), 2);
        assert_ne!(summaries[0].session_id, summaries[1].session_id);
        assert!(!dashboard.running);
    }
}
