use serde::{Deserialize, Serialize};

// ─── Scalar aliases ───────────────────────────────────────────

/// Simulated time. Dimensionless, non-negative, finite while scheduled.
pub type Time = f64;

/// Event sequence id, assigned monotonically by the executive.
pub type EventId = u64;

/// Handle of a model element in the model's arena.
pub type ElementId = usize;

/// Conditional-action registration id, assigned monotonically.
pub type ActionId = u64;

/// Event priority. Smaller values dispatch first at equal times.
pub type Priority = i32;

// ─── Reserved event priorities ────────────────────────────────

/// Priority used when the caller does not specify one.
pub const DEFAULT_PRIORITY: Priority = 10;

/// Timed-update events preempt ordinary work at equal times.
pub const TIMED_UPDATE_PRIORITY: Priority = 3;

/// Batch-boundary events run late at equal times.
pub const BATCH_PRIORITY: Priority = 8000;

/// Warm-up events run after batch boundaries, before end-of-replication.
pub const WARMUP_PRIORITY: Priority = 9000;

/// The distinguished end-of-replication event runs last at equal times.
pub const END_REPLICATION_PRIORITY: Priority = 10000;

// ─── Time units ───────────────────────────────────────────────

/// Conversion constants for expressing durations in simulated time.
///
/// The model publishes a scale factor relative to milliseconds
/// (`Model::time_unit`); dividing one of these constants by that factor
/// converts the named unit into simulated-time units.
pub mod time_unit {
    pub const MILLISECOND: f64 = 1.0;
    pub const SECOND: f64 = 1_000.0 * MILLISECOND;
    pub const MINUTE: f64 = 60.0 * SECOND;
    pub const HOUR: f64 = 60.0 * MINUTE;
    pub const DAY: f64 = 24.0 * HOUR;
    pub const WEEK: f64 = 7.0 * DAY;
}

// ─── Ending status ────────────────────────────────────────────

/// Why an iterative process stopped. Exactly one is set at termination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndingStatus {
    /// Ended from the Initialized state with an empty step sequence.
    NoStepsExecuted,
    /// The step sequence was exhausted after at least one step.
    CompletedAllSteps,
    /// The wall-clock budget was reached after a completed step.
    ExceededExecutionTime,
    /// A stop flag (cooperative stop, scheduled end event) was observed.
    MetStoppingCondition,
    /// The process has not terminated.
    Unfinished,
}

impl EndingStatus {
    /// Returns true once a terminal status has been assigned.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EndingStatus::Unfinished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_priorities_order_as_documented() {
        assert!(TIMED_UPDATE_PRIORITY < DEFAULT_PRIORITY);
        assert!(DEFAULT_PRIORITY < BATCH_PRIORITY);
        assert!(BATCH_PRIORITY < WARMUP_PRIORITY);
        assert!(WARMUP_PRIORITY < END_REPLICATION_PRIORITY);
    }

    #[test]
    fn time_units_scale_from_milliseconds() {
        assert_eq!(time_unit::SECOND, 1_000.0);
        assert_eq!(time_unit::WEEK, 7.0 * 24.0 * 60.0 * 60.0 * 1_000.0);
    }
}
