use crate::error::SimResult;
use crate::executive::Executive;
use crate::experiment::Experiment;
use crate::iterative::{IterativeProcess, IterativeState};
use crate::model::{
    clear_replication_events, dispatch_phase, schedule_replication_events, Model, Phase,
};
use crate::types::EndingStatus;
use std::time::Duration;
use uuid::Uuid;

/// Top-level facade wiring the model tree, the executive, and the
/// experiment parameters into a replication-execution process.
///
/// The outer [`IterativeProcess`] steps once per replication; the executive
/// embeds the inner one that steps once per event.
pub struct Simulation {
    id: Uuid,
    name: String,
    model: Model,
    executive: Executive,
    experiment: Experiment,
    process: IterativeProcess,
}

impl Simulation {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::now_v7(),
            model: Model::new(name.clone()),
            name,
            executive: Executive::new(),
            experiment: Experiment::default(),
            process: IterativeProcess::new("replications"),
        }
    }

    // ─── Accessors ────────────────────────────────────────────

    /// Run identity, for log and trace correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn executive(&self) -> &Executive {
        &self.executive
    }

    pub fn executive_mut(&mut self) -> &mut Executive {
        &mut self.executive
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    pub fn experiment_mut(&mut self) -> &mut Experiment {
        &mut self.experiment
    }

    pub fn set_experiment(&mut self, experiment: Experiment) {
        self.experiment = experiment;
    }

    pub fn state(&self) -> IterativeState {
        self.process.state()
    }

    pub fn ending_status(&self) -> EndingStatus {
        self.process.ending_status()
    }

    pub fn current_replication(&self) -> u32 {
        self.experiment.current_replication
    }

    /// Wall-clock budget for the whole experiment (all replications).
    pub fn set_max_execution_time(&mut self, budget: Option<Duration>) {
        self.process.set_max_execution_time(budget);
    }

    /// Emit progress notifications every `period` while the experiment runs.
    pub fn enable_progress_notifications(&mut self, period: Duration) {
        self.process.enable_progress_notifications(period);
    }

    // ─── Experiment lifecycle ─────────────────────────────────

    /// Per-experiment setup: validate the experiment, assign the pre-order
    /// labels, orchestrate the streams, and dispatch `beforeExperiment`
    /// down the tree. Structural mutation of the tree is locked out until
    /// the experiment ends.
    pub fn initialize(&mut self) -> SimResult<()> {
        self.experiment.validate()?;
        self.process.initialize()?;
        self.experiment.current_replication = 0;

        self.model.mark_pre_order_labels();
        if let Some(controls) = self.experiment.controls.clone() {
            self.model.set_controls(controls);
        }

        let skip = self.experiment.advance_stream_count;
        if skip > 0 {
            self.model
                .for_each_stream(|stream| stream.advance_substreams(skip));
        }
        // The antithetic choreography manages streams itself; the
        // per-replication flags only apply outside it.
        if !self.experiment.antithetic && self.experiment.reset_start_stream {
            self.model.for_each_stream(|stream| stream.reset_start_stream());
        }

        if self.experiment.replication_length.is_infinite()
            && self.experiment.max_replication_execution_time_ms.is_none()
        {
            tracing::warn!(
                simulation = %self.name,
                "replication length is infinite and no wall-clock budget is set; \
                 the run must be stopped externally"
            );
        }

        self.model.set_running(true);
        dispatch_phase(&mut self.model, &mut self.executive, Phase::BeforeExperiment);
        tracing::info!(
            simulation = %self.name,
            id = %self.id,
            replications = self.experiment.replications,
            "experiment initialized"
        );
        Ok(())
    }

    /// Run a single replication (one step of the replication process).
    ///
    /// Completing the final replication, observing a stop request, or
    /// exhausting the experiment's wall-clock budget ends the experiment
    /// and dispatches `afterExperiment`.
    pub fn run_next(&mut self) -> SimResult<()> {
        self.process.ensure_can_step()?;

        self.experiment.current_replication += 1;
        let replication = self.experiment.current_replication;
        tracing::info!(replication, "starting replication");

        self.executive.set_max_execution_time(
            self.experiment
                .max_replication_execution_time_ms
                .map(Duration::from_millis),
        );

        if self.experiment.warm_up_length > 0.0 {
            let root = self.model.root();
            self.model
                .node_mut(root)
                .set_warm_up(self.experiment.warm_up_length);
        }

        // Stream choreography. Antithetic pairs rewind the substream on the
        // even replication and move to the next substream on the odd one.
        if self.experiment.antithetic {
            if replication % 2 == 0 {
                self.model.for_each_stream(|stream| {
                    stream.reset_start_substream();
                    stream.set_antithetic(true);
                });
            } else if replication > 1 {
                self.model.for_each_stream(|stream| {
                    stream.set_antithetic(false);
                    stream.advance_to_next_substream();
                });
            }
        } else if replication > 1 && self.experiment.advance_next_substream {
            self.model
                .for_each_stream(|stream| stream.advance_to_next_substream());
        }

        self.executive.initialize()?;
        dispatch_phase(&mut self.model, &mut self.executive, Phase::BeforeReplication);
        schedule_replication_events(&mut self.model, &mut self.executive)?;

        if self.experiment.replication_length.is_finite() {
            self.executive
                .schedule_end(self.experiment.replication_length, self.model.root())?;
        }

        if self.experiment.replication_initialization {
            dispatch_phase(&mut self.model, &mut self.executive, Phase::Initialize);
        }
        dispatch_phase(
            &mut self.model,
            &mut self.executive,
            Phase::RegisterConditionalActions,
        );
        if self.experiment.monte_carlo {
            dispatch_phase(&mut self.model, &mut self.executive, Phase::MonteCarlo);
        }

        self.executive.run(&mut self.model)?;

        dispatch_phase(&mut self.model, &mut self.executive, Phase::ReplicationEnded);
        dispatch_phase(&mut self.model, &mut self.executive, Phase::AfterReplication);

        clear_replication_events(&mut self.model, &mut self.executive);
        if self.experiment.garbage_collect_after_replication {
            self.executive.release_scoped();
        }
        tracing::info!(
            replication,
            events = self.executive.executed_count(),
            final_time = self.executive.time(),
            "replication ended"
        );

        self.process.complete_step();
        if self.process.stop_requested() {
            let message = self.process.stop_message().map(str::to_string);
            self.end_experiment(EndingStatus::MetStoppingCondition, message)?;
        } else if self.process.budget_exceeded() {
            self.end_experiment(EndingStatus::ExceededExecutionTime, None)?;
        } else if replication >= self.experiment.replications {
            self.end_experiment(EndingStatus::CompletedAllSteps, None)?;
        }
        Ok(())
    }

    /// Run the whole experiment: initialize if needed, then replications to
    /// completion.
    pub fn run(&mut self) -> SimResult<()> {
        match self.process.state() {
            IterativeState::Created | IterativeState::Ended => self.initialize()?,
            _ => {}
        }
        while self.process.state() != IterativeState::Ended {
            self.run_next()?;
        }
        Ok(())
    }

    /// Cooperative stop: the current replication finishes, then the
    /// experiment ends. Also stops the executive so an in-flight
    /// replication halts at its next event boundary.
    pub fn stop(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.process.stop(message.clone());
        self.executive.stop(message);
    }

    /// Immediate end of the experiment, with teardown.
    pub fn end(&mut self, message: impl Into<String>) -> SimResult<()> {
        let message = message.into();
        if matches!(
            self.executive.state(),
            IterativeState::Initialized | IterativeState::StepCompleted
        ) {
            self.executive.end(message.clone())?;
        }
        self.end_experiment(EndingStatus::MetStoppingCondition, Some(message))
    }

    fn end_experiment(&mut self, status: EndingStatus, message: Option<String>) -> SimResult<()> {
        // Transition first so a second end() is rejected before the
        // teardown dispatch could run twice.
        self.process.end(status, message)?;
        dispatch_phase(&mut self.model, &mut self.executive, Phase::AfterExperiment);
        self.model.set_running(false);
        tracing::info!(
            simulation = %self.name,
            replications = self.experiment.current_replication,
            status = ?status,
            "experiment ended"
        );
        Ok(())
    }
}
