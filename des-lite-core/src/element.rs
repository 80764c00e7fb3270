use crate::conditional::ConditionalAction;
use crate::error::SimResult;
use crate::event::EventAction;
use crate::executive::Executive;
use crate::model::Model;
use crate::observer::{ModelObserver, ObserverState};
use crate::stream::{RandomSource, StreamId};
use crate::types::{
    ActionId, ElementId, EventId, Priority, Time, DEFAULT_PRIORITY, TIMED_UPDATE_PRIORITY,
    WARMUP_PRIORITY,
};
use serde::{Deserialize, Serialize};

// ─── Participation flags ──────────────────────────────────────

/// Per-lifecycle participation flags of a model element.
///
/// A cleared flag suppresses the element's own hook body and notification
/// for that phase; the dispatch still recurses into its children.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParticipationFlags {
    pub before_experiment: bool,
    pub before_replication: bool,
    pub initialize: bool,
    pub monte_carlo: bool,
    pub replication_ended: bool,
    pub after_replication: bool,
    pub after_experiment: bool,
    /// When set (and the element has no warm-up length of its own) the
    /// element takes part in its parent's warm-up. Scheduling an own
    /// warm-up length clears it.
    pub warm_up: bool,
    pub timed_update: bool,
    pub update_notifications: bool,
}

impl Default for ParticipationFlags {
    fn default() -> Self {
        Self {
            before_experiment: true,
            before_replication: true,
            initialize: true,
            monte_carlo: false,
            replication_ended: true,
            after_replication: true,
            after_experiment: true,
            warm_up: true,
            timed_update: true,
            update_notifications: true,
        }
    }
}

/// Warm-up configuration. A length of zero means the element schedules no
/// warm-up of its own.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WarmUpConfig {
    pub length: Time,
    pub priority: Priority,
}

impl Default for WarmUpConfig {
    fn default() -> Self {
        Self {
            length: 0.0,
            priority: WARMUP_PRIORITY,
        }
    }
}

/// Timed-update configuration. An interval of zero disables timed updates.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TimedUpdateConfig {
    pub interval: Time,
    pub priority: Priority,
}

impl Default for TimedUpdateConfig {
    fn default() -> Self {
        Self {
            interval: 0.0,
            priority: TIMED_UPDATE_PRIORITY,
        }
    }
}

// ─── Behavior ─────────────────────────────────────────────────

/// User-overridable lifecycle bodies of a model element.
///
/// Every hook defaults to a no-op; elements implement the phases they care
/// about. The dispatchers in [`crate::model`] walk the tree children-first,
/// gate each body on the element's participation flag, and emit the
/// matching observer notification.
#[allow(unused_variables)]
pub trait ModelBehavior {
    fn before_experiment(&mut self, ctx: &mut ElementContext<'_>) {}
    fn before_replication(&mut self, ctx: &mut ElementContext<'_>) {}
    fn initialize(&mut self, ctx: &mut ElementContext<'_>) {}
    fn register_conditional_actions(&mut self, ctx: &mut ElementContext<'_>) {}
    fn monte_carlo(&mut self, ctx: &mut ElementContext<'_>) {}
    fn update(&mut self, ctx: &mut ElementContext<'_>) {}
    fn warm_up(&mut self, ctx: &mut ElementContext<'_>) {}
    fn timed_update(&mut self, ctx: &mut ElementContext<'_>) {}
    fn replication_ended(&mut self, ctx: &mut ElementContext<'_>) {}
    fn after_replication(&mut self, ctx: &mut ElementContext<'_>) {}
    fn after_experiment(&mut self, ctx: &mut ElementContext<'_>) {}
}

/// Execution context handed to behavior hooks: the element's own id plus
/// mutable access to the model and the executive.
pub struct ElementContext<'a> {
    pub element: ElementId,
    pub model: &'a mut Model,
    pub executive: &'a mut Executive,
}

impl ElementContext<'_> {
    pub fn time(&self) -> Time {
        self.executive.time()
    }

    /// Schedule an event owned by this element at the default priority.
    pub fn schedule(
        &mut self,
        delta: Time,
        name: impl Into<String>,
        action: EventAction,
    ) -> SimResult<EventId> {
        self.executive
            .schedule(self.element, delta, DEFAULT_PRIORITY, name, None, action)
    }

    pub fn schedule_with_priority(
        &mut self,
        delta: Time,
        priority: Priority,
        name: impl Into<String>,
        action: EventAction,
    ) -> SimResult<EventId> {
        self.executive
            .schedule(self.element, delta, priority, name, None, action)
    }

    pub fn register_conditional_action(
        &mut self,
        action: Box<dyn ConditionalAction>,
    ) -> ActionId {
        self.executive.register_conditional_action(action)
    }

    /// Draw access to a registered random source.
    pub fn stream(&mut self, id: StreamId) -> &mut dyn RandomSource {
        self.model.stream_mut(id)
    }

    /// Experiment control override, if one was supplied.
    pub fn control(&self, name: &str) -> Option<f64> {
        self.model.control(name)
    }
}

// ─── Element node ─────────────────────────────────────────────

/// A node of the model-element tree, stored in the model's arena.
pub struct ElementNode {
    id: ElementId,
    name: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    pub flags: ParticipationFlags,
    warm_up: WarmUpConfig,
    timed_update: TimedUpdateConfig,
    pub(crate) warm_up_event: Option<EventId>,
    pub(crate) timed_update_event: Option<EventId>,
    pub(crate) observers: Vec<Box<dyn ModelObserver>>,
    observer_state: Option<ObserverState>,
    left: u32,
    right: u32,
    behavior: Option<Box<dyn ModelBehavior>>,
}

impl ElementNode {
    pub(crate) fn new(
        id: ElementId,
        name: String,
        parent: Option<ElementId>,
        behavior: Option<Box<dyn ModelBehavior>>,
    ) -> Self {
        Self {
            id,
            name,
            parent,
            children: Vec::new(),
            flags: ParticipationFlags::default(),
            warm_up: WarmUpConfig::default(),
            timed_update: TimedUpdateConfig::default(),
            warm_up_event: None,
            timed_update_event: None,
            observers: Vec::new(),
            observer_state: None,
            left: 0,
            right: 0,
            behavior,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn warm_up(&self) -> WarmUpConfig {
        self.warm_up
    }

    pub fn timed_update(&self) -> TimedUpdateConfig {
        self.timed_update
    }

    /// Give this element its own warm-up. A positive length clears the
    /// inherit flag so the parent's warm-up no longer propagates here.
    pub fn set_warm_up(&mut self, length: Time) {
        self.warm_up.length = length;
        if length > 0.0 {
            self.flags.warm_up = false;
        }
    }

    pub fn set_warm_up_priority(&mut self, priority: Priority) {
        self.warm_up.priority = priority;
    }

    /// Enable timed updates every `interval` (zero disables).
    pub fn set_timed_update(&mut self, interval: Time) {
        self.timed_update.interval = interval;
    }

    pub fn set_timed_update_priority(&mut self, priority: Priority) {
        self.timed_update.priority = priority;
    }

    pub fn warm_up_event(&self) -> Option<EventId> {
        self.warm_up_event
    }

    pub fn timed_update_event(&self) -> Option<EventId> {
        self.timed_update_event
    }

    /// Label of the most recent notification emitted for this element, or
    /// `None` before the first notification.
    pub fn observer_state(&self) -> Option<ObserverState> {
        self.observer_state
    }

    /// Pre-order labels: for any descendant `w` of `v`,
    /// `left(v) < left(w)` and `right(w) < right(v)`.
    pub fn left_label(&self) -> u32 {
        self.left
    }

    pub fn right_label(&self) -> u32 {
        self.right
    }

    pub fn attach_observer(&mut self, observer: Box<dyn ModelObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn add_child(&mut self, child: ElementId) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: ElementId) {
        self.children.retain(|&c| c != child);
    }

    pub(crate) fn set_labels(&mut self, left: u32, right: u32) {
        self.left = left;
        self.right = right;
    }

    pub(crate) fn take_behavior(&mut self) -> Option<Box<dyn ModelBehavior>> {
        self.behavior.take()
    }

    pub(crate) fn put_behavior(&mut self, behavior: Box<dyn ModelBehavior>) {
        self.behavior = Some(behavior);
    }

    pub(crate) fn set_observer_state(&mut self, state: ObserverState) {
        self.observer_state = Some(state);
    }
}
