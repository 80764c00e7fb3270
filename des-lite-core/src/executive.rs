use crate::conditional::{ConditionalAction, ConditionalActionProcessor};
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventAction, EventSet};
use crate::iterative::{IterativeProcess, IterativeState};
use crate::model::Model;
use crate::observer::{ModelObserver, ObserverState};
use crate::types::{
    ActionId, ElementId, EndingStatus, EventId, Priority, Time, END_REPLICATION_PRIORITY,
};
use std::any::Any;
use std::time::Duration;

/// Summary of the most recently dispatched event.
#[derive(Clone, Debug)]
pub struct ExecutedEvent {
    pub id: EventId,
    pub name: String,
    pub time: Time,
    pub priority: Priority,
    pub owner: ElementId,
}

/// The driver that advances simulated time by dispatching events.
///
/// Owns the event set, the current clock, the conditional-action processor,
/// and the embedded [`IterativeProcess`] whose step is the dispatch of one
/// event. The current time always equals the time of the last dispatched
/// non-canceled event, or 0 before any dispatch.
pub struct Executive {
    time: Time,
    events: EventSet,
    next_event_id: EventId,
    process: IterativeProcess,
    conditional_actions: ConditionalActionProcessor,
    scheduled_count: u64,
    scheduled_during_execution: u64,
    executed_count: u64,
    in_event: bool,
    end_event: Option<EventId>,
    end_time: Option<Time>,
    actual_ending_time: Option<Time>,
    last_executed: Option<ExecutedEvent>,
    observers: Vec<Box<dyn ModelObserver>>,
}

impl Default for Executive {
    fn default() -> Self {
        Self::new()
    }
}

impl Executive {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            events: EventSet::new(),
            next_event_id: 0,
            process: IterativeProcess::new("executive"),
            conditional_actions: ConditionalActionProcessor::new(),
            scheduled_count: 0,
            scheduled_during_execution: 0,
            executed_count: 0,
            in_event: false,
            end_event: None,
            end_time: None,
            actual_ending_time: None,
            last_executed: None,
            observers: Vec::new(),
        }
    }

    // ─── Accessors ────────────────────────────────────────────

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn state(&self) -> IterativeState {
        self.process.state()
    }

    pub fn ending_status(&self) -> EndingStatus {
        self.process.ending_status()
    }

    pub fn stop_message(&self) -> Option<&str> {
        self.process.stop_message()
    }

    pub fn scheduled_count(&self) -> u64 {
        self.scheduled_count
    }

    pub fn scheduled_during_execution(&self) -> u64 {
        self.scheduled_during_execution
    }

    pub fn executed_count(&self) -> u64 {
        self.executed_count
    }

    pub fn last_executed(&self) -> Option<&ExecutedEvent> {
        self.last_executed.as_ref()
    }

    pub fn pending_events(&self) -> &EventSet {
        &self.events
    }

    pub fn end_event(&self) -> Option<EventId> {
        self.end_event
    }

    /// Time at which the scheduled end event actually fired, if it did.
    pub fn actual_ending_time(&self) -> Option<Time> {
        self.actual_ending_time
    }

    pub fn set_max_execution_time(&mut self, budget: Option<Duration>) {
        self.process.set_max_execution_time(budget);
    }

    pub fn max_execution_time(&self) -> Option<Duration> {
        self.process.max_execution_time()
    }

    // ─── Lifecycle ────────────────────────────────────────────

    /// Reset the executive for a fresh run: clock to 0, event set cleared,
    /// counters zeroed, conditional registrations dropped. Event ids keep
    /// counting across runs.
    pub fn initialize(&mut self) -> SimResult<()> {
        self.process.initialize()?;
        self.time = 0.0;
        self.events.clear();
        self.conditional_actions.unregister_all();
        self.scheduled_count = 0;
        self.scheduled_during_execution = 0;
        self.executed_count = 0;
        self.in_event = false;
        self.end_event = None;
        self.end_time = None;
        self.actual_ending_time = None;
        self.last_executed = None;
        Ok(())
    }

    /// Cooperative stop: observed after the current step completes.
    pub fn stop(&mut self, message: impl Into<String>) {
        self.process.stop(message);
    }

    /// Eagerly release per-replication registrations (pending events and
    /// conditional actions) once a replication has ended.
    pub(crate) fn release_scoped(&mut self) {
        self.events.clear();
        self.conditional_actions.unregister_all();
    }

    /// Immediate transition to Ended. Legal from Created, Initialized, and
    /// StepCompleted.
    pub fn end(&mut self, message: impl Into<String>) -> SimResult<()> {
        self.process
            .end(EndingStatus::MetStoppingCondition, Some(message.into()))
    }

    // ─── Scheduling API ───────────────────────────────────────

    /// Schedule `action` to fire `delta` after the current time.
    ///
    /// The returned id is consumed even when the event is not inserted:
    /// scheduling against a Created or Ended executive warns and skips
    /// insertion, and an event landing strictly beyond the scheduled end
    /// time is dropped without incrementing the scheduled counter.
    pub fn schedule(
        &mut self,
        owner: ElementId,
        delta: Time,
        priority: Priority,
        name: impl Into<String>,
        payload: Option<Box<dyn Any>>,
        action: EventAction,
    ) -> SimResult<EventId> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(SimError::invalid_argument(format!(
                "schedule delta must be finite and non-negative, got {delta}"
            )));
        }
        let id = self.next_event_id;
        self.next_event_id += 1;
        let name = name.into();

        match self.process.state() {
            IterativeState::Created | IterativeState::Ended => {
                tracing::warn!(
                    state = ?self.process.state(),
                    event = %name,
                    "scheduling against an executive that is not running; event not inserted"
                );
                return Ok(id);
            }
            _ => {}
        }

        let time = self.time + delta;
        if let Some(end_time) = self.end_time {
            if time > end_time {
                tracing::warn!(
                    event = %name,
                    time,
                    end_time,
                    "event scheduled beyond the end of the replication; dropped"
                );
                return Ok(id);
            }
        }

        self.events
            .insert(Event::new(id, time, priority, name, owner, payload, action));
        self.scheduled_count += 1;
        if self.in_event {
            self.scheduled_during_execution += 1;
        }
        Ok(id)
    }

    /// Mark a scheduled event canceled. Its action will never run; the
    /// entry is discarded when it would have been dispatched.
    pub fn cancel(&mut self, id: EventId) -> SimResult<()> {
        self.events.cancel(id)
    }

    /// Schedule the distinguished end-of-replication event at absolute time
    /// `time`, replacing (by cancellation) any end event already scheduled.
    pub fn schedule_end(&mut self, time: Time, owner: ElementId) -> SimResult<EventId> {
        if matches!(
            self.process.state(),
            IterativeState::Created | IterativeState::Ended
        ) {
            return Err(SimError::illegal_state(format!(
                "schedule_end requires an initialized executive, state is {:?}",
                self.process.state()
            )));
        }
        if !time.is_finite() || time <= 0.0 {
            return Err(SimError::invalid_argument(format!(
                "end time must be finite and positive, got {time}"
            )));
        }
        if time < self.time {
            return Err(SimError::invalid_argument(format!(
                "end time {time} precedes current time {}",
                self.time
            )));
        }
        if let Some(prior) = self.end_event.take() {
            self.end_time = None;
            if self.events.contains(prior) {
                self.events.cancel(prior)?;
            }
        }
        let id = self.schedule(
            owner,
            time - self.time,
            END_REPLICATION_PRIORITY,
            "end_replication",
            None,
            Box::new(|executive, _model, event| executive.note_end_event(event)),
        )?;
        self.end_event = Some(id);
        self.end_time = Some(time);
        Ok(id)
    }

    fn note_end_event(&mut self, event: &Event) {
        self.actual_ending_time = Some(event.time());
        self.process
            .stop(format!("scheduled end event fired at t={}", event.time()));
    }

    // ─── Conditional actions ──────────────────────────────────

    pub fn register_conditional_action(&mut self, action: Box<dyn ConditionalAction>) -> ActionId {
        self.conditional_actions.register(action)
    }

    pub fn register_conditional_action_with_priority(
        &mut self,
        action: Box<dyn ConditionalAction>,
        priority: Priority,
    ) -> ActionId {
        self.conditional_actions
            .register_with_priority(action, priority)
    }

    pub fn unregister_conditional_action(&mut self, id: ActionId) -> SimResult<()> {
        self.conditional_actions.unregister(id)
    }

    pub fn unregister_all_conditional_actions(&mut self) {
        self.conditional_actions.unregister_all()
    }

    pub fn change_conditional_priority(
        &mut self,
        id: ActionId,
        priority: Priority,
    ) -> SimResult<()> {
        self.conditional_actions.change_priority(id, priority)
    }

    pub fn set_max_scans(&mut self, max_scans: u32) -> SimResult<()> {
        self.conditional_actions.set_max_scans(max_scans)
    }

    pub fn set_max_scan_flag(&mut self, enforce: bool) {
        self.conditional_actions.set_max_scan_flag(enforce)
    }

    /// Scan count of the most recent completed C-phase.
    pub fn conditional_scan_count(&self) -> u32 {
        self.conditional_actions.last_scan_count()
    }

    /// Sweep conditional actions to a fixed point.
    ///
    /// The processor is swapped out for the duration of the sweep so the
    /// actions can borrow the executive; registrations made mid-phase land
    /// on the replacement and are merged back afterwards.
    pub fn perform_c_phase(&mut self, model: &mut Model) -> SimResult<()> {
        if self.conditional_actions.is_empty() {
            return Ok(());
        }
        let next_id = self.conditional_actions.next_id_hint();
        let mut scanning = std::mem::replace(
            &mut self.conditional_actions,
            ConditionalActionProcessor::starting_at(next_id),
        );
        let result = scanning.run_scans(self, model);
        let added = std::mem::take(&mut self.conditional_actions);
        scanning.absorb(added);
        self.conditional_actions = scanning;
        result
    }

    // ─── Observers ────────────────────────────────────────────

    /// Attach an observer receiving BeforeEvent/AfterEvent notifications.
    pub fn add_observer(&mut self, observer: Box<dyn ModelObserver>) {
        self.observers.push(observer);
    }

    fn notify_observers(&mut self, label: ObserverState, event: &Event) {
        for observer in &mut self.observers {
            observer.notify(event.owner(), label, Some(event));
        }
    }

    // ─── Stepping ─────────────────────────────────────────────

    /// Dispatch exactly one event (one step of the embedded process).
    ///
    /// Runs the C-phase afterwards when the next pending event sits at a
    /// strictly later time, then applies the stop conditions.
    pub fn execute_next(&mut self, model: &mut Model) -> SimResult<()> {
        self.process.ensure_can_step()?;

        let Some(mut event) = self.events.pop() else {
            return Err(SimError::NoSuchStep("the event set is empty".into()));
        };

        if event.time() < self.time {
            return Err(SimError::OrderingViolation {
                id: event.id(),
                name: event.name().to_string(),
                owner: event.owner(),
                event_time: event.time(),
                current_time: self.time,
            });
        }
        self.time = event.time();

        tracing::debug!(
            id = event.id(),
            name = event.name(),
            time = event.time(),
            owner = event.owner(),
            "dispatching event"
        );
        self.notify_observers(ObserverState::BeforeEvent, &event);

        let mut action = event
            .take_action()
            .expect("dispatched event carries no action");
        self.in_event = true;
        action(self, model, &mut event);
        self.in_event = false;
        event.put_action(action);

        self.executed_count += 1;
        self.last_executed = Some(ExecutedEvent {
            id: event.id(),
            name: event.name().to_string(),
            time: event.time(),
            priority: event.priority(),
            owner: event.owner(),
        });
        self.notify_observers(ObserverState::AfterEvent, &event);

        // Repeat-event pattern: the action may have re-armed its own event.
        if let Some(delta) = event.take_reschedule() {
            event.set_canceled(false);
            event.set_time(self.time + delta);
            self.events.insert(event);
            self.scheduled_count += 1;
        }

        // C-phase runs only when simulated time is about to advance.
        let next_time = self.events.peek().map(|e| e.time());
        if let Some(next_time) = next_time {
            if next_time > self.time {
                self.perform_c_phase(model)?;
            }
        }

        self.process.complete_step();
        if self.process.stop_requested() {
            let message = self.process.stop_message().map(str::to_string);
            self.process.end(EndingStatus::MetStoppingCondition, message)?;
        } else if self.process.budget_exceeded() {
            self.process.end(EndingStatus::ExceededExecutionTime, None)?;
        }
        Ok(())
    }

    /// Run to natural completion: no more events, stop flag observed,
    /// scheduled end event fired, or the wall-clock budget is reached.
    pub fn run(&mut self, model: &mut Model) -> SimResult<()> {
        self.process.ensure_can_step()?;
        loop {
            if self.process.state() == IterativeState::Ended {
                return Ok(());
            }
            if self.events.peek().is_none() {
                let status = if self.process.step_count() == 0 {
                    EndingStatus::NoStepsExecuted
                } else {
                    EndingStatus::CompletedAllSteps
                };
                self.events.clear();
                self.process.end(status, None)?;
                return Ok(());
            }
            self.execute_next(model)?;
        }
    }
}
