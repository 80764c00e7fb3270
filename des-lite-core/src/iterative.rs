use crate::error::{SimError, SimResult};
use crate::types::EndingStatus;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle state of an iterative process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IterativeState {
    Created,
    Initialized,
    StepCompleted,
    Ended,
}

/// Step-driven state machine shared by the executive (steps are events) and
/// the simulation (steps are replications).
///
/// Owns the lifecycle state, wall-clock accounting, the optional execution
/// budget, the cooperative stop flag, and the ending status. The drivers
/// supply the step semantics and call back into this machine to validate
/// transitions:
///
/// ```text
///  Created ── initialize ─▶ Initialized ── step ─▶ StepCompleted ─┐
///     │                         │    ▲___________________step ____│
///     └── end ─▶ Ended ◀── end ─┴──────────────────────── end ────┘
///                  └── initialize ─▶ Initialized
/// ```
pub struct IterativeProcess {
    name: &'static str,
    state: IterativeState,
    began_at: Option<Instant>,
    ended_at: Option<Instant>,
    max_execution_time: Option<Duration>,
    step_count: u64,
    stop_requested: bool,
    stop_message: Option<String>,
    ending_status: EndingStatus,
    progress_every: Option<Duration>,
    progress_kill: Option<Arc<AtomicBool>>,
}

impl IterativeProcess {
    /// `name` labels this process in logs and error messages.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: IterativeState::Created,
            began_at: None,
            ended_at: None,
            max_execution_time: None,
            step_count: 0,
            stop_requested: false,
            stop_message: None,
            ending_status: EndingStatus::Unfinished,
            progress_every: None,
            progress_kill: None,
        }
    }

    pub fn state(&self) -> IterativeState {
        self.state
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn ending_status(&self) -> EndingStatus {
        self.ending_status
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn stop_message(&self) -> Option<&str> {
        self.stop_message.as_deref()
    }

    /// Wall clock consumed so far, or over the whole run once ended.
    pub fn elapsed(&self) -> Duration {
        match (self.began_at, self.ended_at) {
            (Some(b), Some(e)) => e.duration_since(b),
            (Some(b), None) => b.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Set (or clear) the wall-clock budget. Enforcement is cooperative:
    /// the driver checks `budget_exceeded` only after a completed step.
    pub fn set_max_execution_time(&mut self, budget: Option<Duration>) {
        self.max_execution_time = budget;
    }

    pub fn max_execution_time(&self) -> Option<Duration> {
        self.max_execution_time
    }

    pub fn budget_exceeded(&self) -> bool {
        match self.max_execution_time {
            Some(budget) => self.elapsed() >= budget,
            None => false,
        }
    }

    /// Emit a progress notification every `period` while the process runs.
    /// The timer thread only logs; it never touches simulation state.
    pub fn enable_progress_notifications(&mut self, period: Duration) {
        self.progress_every = Some(period);
    }

    // ─── Transitions ──────────────────────────────────────────

    /// Created | Ended → Initialized. Resets step count, stop flag, timing,
    /// and ending status.
    pub fn initialize(&mut self) -> SimResult<()> {
        match self.state {
            IterativeState::Created | IterativeState::Ended => {
                self.kill_progress_timer();
                self.state = IterativeState::Initialized;
                self.began_at = Some(Instant::now());
                self.ended_at = None;
                self.step_count = 0;
                self.stop_requested = false;
                self.stop_message = None;
                self.ending_status = EndingStatus::Unfinished;
                if let Some(period) = self.progress_every {
                    self.spawn_progress_timer(period);
                }
                Ok(())
            }
            other => Err(SimError::illegal_state(format!(
                "{}: initialize() from {:?}",
                self.name, other
            ))),
        }
    }

    /// Checked before each step: the process must be Initialized or
    /// StepCompleted.
    pub fn ensure_can_step(&self) -> SimResult<()> {
        match self.state {
            IterativeState::Initialized | IterativeState::StepCompleted => Ok(()),
            other => Err(SimError::illegal_state(format!(
                "{}: cannot run a step from {:?}",
                self.name, other
            ))),
        }
    }

    /// Record a completed step.
    pub fn complete_step(&mut self) {
        self.step_count += 1;
        self.state = IterativeState::StepCompleted;
    }

    /// Request a cooperative stop; observed by the driver after the current
    /// step completes.
    pub fn stop(&mut self, message: impl Into<String>) {
        self.stop_requested = true;
        self.stop_message = Some(message.into());
    }

    /// Created | Initialized | StepCompleted → Ended with the given status.
    pub fn end(&mut self, status: EndingStatus, message: Option<String>) -> SimResult<()> {
        match self.state {
            IterativeState::Created | IterativeState::Initialized | IterativeState::StepCompleted => {
                self.state = IterativeState::Ended;
                self.ended_at = Some(Instant::now());
                self.ending_status = status;
                if let Some(msg) = message {
                    self.stop_message = Some(msg);
                }
                self.kill_progress_timer();
                tracing::debug!(
                    process = self.name,
                    steps = self.step_count,
                    status = ?status,
                    "iterative process ended"
                );
                Ok(())
            }
            IterativeState::Ended => Err(SimError::illegal_state(format!(
                "{}: end() from Ended",
                self.name
            ))),
        }
    }

    fn spawn_progress_timer(&mut self, period: Duration) {
        let kill = Arc::new(AtomicBool::new(false));
        self.progress_kill = Some(kill.clone());
        let name = self.name;
        let began = Instant::now();
        std::thread::spawn(move || loop {
            std::thread::sleep(period);
            if kill.load(AtomicOrdering::Relaxed) {
                break;
            }
            tracing::info!(
                process = name,
                elapsed_ms = began.elapsed().as_millis() as u64,
                "still running"
            );
        });
    }

    fn kill_progress_timer(&mut self) {
        if let Some(kill) = self.progress_kill.take() {
            kill.store(true, AtomicOrdering::Relaxed);
        }
    }
}

impl Drop for IterativeProcess {
    fn drop(&mut self) {
        self.kill_progress_timer();
    }
}
