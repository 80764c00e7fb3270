use crate::error::{SimError, SimResult};
use crate::types::Time;
use serde::{Deserialize, Serialize};

/// Hook invoked with each completed sojourn. Statistical accumulators live
/// outside the kernel and plug in through this seam.
pub trait SojournObserver {
    fn sojourn_completed(&mut self, entered_at: Time, exited_at: Time);
}

/// Counting snapshot of a [`State`], for reports.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub label: String,
    pub in_state: bool,
    pub enter_count: u64,
    pub exit_count: u64,
    pub total_time_in_state: Time,
}

/// Sojourn-bearing state record.
///
/// Tracks whether an entity is currently in the state, first/last enter and
/// exit times, enter/exit counts, and cumulative time in state. Enter and
/// exit times must be finite, non-negative, and non-decreasing per visit.
pub struct State {
    label: String,
    in_state: bool,
    first_enter_time: Option<Time>,
    last_enter_time: Option<Time>,
    last_exit_time: Option<Time>,
    enter_count: u64,
    exit_count: u64,
    total_time_in_state: Time,
    collector: Option<Box<dyn SojournObserver>>,
}

impl State {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            in_state: false,
            first_enter_time: None,
            last_enter_time: None,
            last_exit_time: None,
            enter_count: 0,
            exit_count: 0,
            total_time_in_state: 0.0,
            collector: None,
        }
    }

    pub fn with_collector(
        label: impl Into<String>,
        collector: Box<dyn SojournObserver>,
    ) -> Self {
        let mut state = Self::new(label);
        state.collector = Some(collector);
        state
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn in_state(&self) -> bool {
        self.in_state
    }

    pub fn first_enter_time(&self) -> Option<Time> {
        self.first_enter_time
    }

    pub fn last_enter_time(&self) -> Option<Time> {
        self.last_enter_time
    }

    pub fn last_exit_time(&self) -> Option<Time> {
        self.last_exit_time
    }

    pub fn enter_count(&self) -> u64 {
        self.enter_count
    }

    pub fn exit_count(&self) -> u64 {
        self.exit_count
    }

    pub fn total_time_in_state(&self) -> Time {
        self.total_time_in_state
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            label: self.label.clone(),
            in_state: self.in_state,
            enter_count: self.enter_count,
            exit_count: self.exit_count,
            total_time_in_state: self.total_time_in_state,
        }
    }

    pub fn enter(&mut self, time: Time) -> SimResult<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(SimError::invalid_argument(format!(
                "enter time must be finite and non-negative, got {time}"
            )));
        }
        if self.in_state {
            return Err(SimError::illegal_state(format!(
                "state '{}' entered while already in state",
                self.label
            )));
        }
        self.in_state = true;
        if self.first_enter_time.is_none() {
            self.first_enter_time = Some(time);
        }
        self.last_enter_time = Some(time);
        self.enter_count += 1;
        Ok(())
    }

    /// Leave the state, returning the completed sojourn time.
    pub fn exit(&mut self, time: Time) -> SimResult<Time> {
        if !time.is_finite() || time < 0.0 {
            return Err(SimError::invalid_argument(format!(
                "exit time must be finite and non-negative, got {time}"
            )));
        }
        if !self.in_state {
            return Err(SimError::illegal_state(format!(
                "state '{}' exited while not in state",
                self.label
            )));
        }
        let entered_at = self.last_enter_time.expect("in_state implies an enter time");
        if time < entered_at {
            return Err(SimError::invalid_argument(format!(
                "exit time {time} precedes enter time {entered_at}"
            )));
        }
        self.in_state = false;
        self.last_exit_time = Some(time);
        self.exit_count += 1;
        let sojourn = time - entered_at;
        self.total_time_in_state += sojourn;
        if let Some(collector) = &mut self.collector {
            collector.sojourn_completed(entered_at, time);
        }
        Ok(sojourn)
    }

    /// Reset all accounting; the label and collector stay.
    pub fn initialize(&mut self) {
        self.in_state = false;
        self.first_enter_time = None;
        self.last_enter_time = None;
        self.last_exit_time = None;
        self.enter_count = 0;
        self.exit_count = 0;
        self.total_time_in_state = 0.0;
    }
}
