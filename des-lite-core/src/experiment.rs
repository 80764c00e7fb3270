use crate::error::{SimError, SimResult};
use crate::types::Time;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters of one experiment: how many replications to run, how long
/// each one lasts, and how the random streams are orchestrated.
///
/// Plain serde-round-trippable data; the [`crate::simulation::Simulation`]
/// interprets it. An infinite replication length is legal; the run must
/// then be bounded by a wall-clock budget or stopped externally.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Experiment {
    pub name: String,
    pub replications: u32,
    pub replication_length: Time,
    pub warm_up_length: Time,
    pub reset_start_stream: bool,
    pub advance_next_substream: bool,
    pub replication_initialization: bool,
    pub antithetic: bool,
    pub garbage_collect_after_replication: bool,
    pub monte_carlo: bool,
    /// Substreams to skip on every registered stream before the experiment.
    pub advance_stream_count: u64,
    /// Per-replication wall-clock budget, in milliseconds.
    pub max_replication_execution_time_ms: Option<u64>,
    /// Replication counter, 1-based during a run.
    pub current_replication: u32,
    /// Name → value overrides readable by elements during the experiment.
    pub controls: Option<HashMap<String, f64>>,
}

impl Default for Experiment {
    fn default() -> Self {
        Self {
            name: "experiment".to_string(),
            replications: 1,
            replication_length: Time::INFINITY,
            warm_up_length: 0.0,
            reset_start_stream: false,
            advance_next_substream: true,
            replication_initialization: true,
            antithetic: false,
            garbage_collect_after_replication: false,
            monte_carlo: false,
            advance_stream_count: 0,
            max_replication_execution_time_ms: None,
            current_replication: 0,
            controls: None,
        }
    }
}

impl Experiment {
    pub fn validate(&self) -> SimResult<()> {
        if self.replications == 0 {
            return Err(SimError::invalid_argument(
                "an experiment needs at least one replication",
            ));
        }
        if self.antithetic && self.replications % 2 != 0 {
            return Err(SimError::invalid_argument(format!(
                "antithetic experiments need an even replication count, got {}",
                self.replications
            )));
        }
        if self.replication_length.is_nan() || self.replication_length <= 0.0 {
            return Err(SimError::invalid_argument(format!(
                "replication length must be positive, got {}",
                self.replication_length
            )));
        }
        if !self.warm_up_length.is_finite() || self.warm_up_length < 0.0 {
            return Err(SimError::invalid_argument(format!(
                "warm-up length must be finite and non-negative, got {}",
                self.warm_up_length
            )));
        }
        Ok(())
    }
}
