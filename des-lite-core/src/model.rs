use crate::element::{ElementContext, ElementNode, ModelBehavior};
use crate::error::{SimError, SimResult};
use crate::event::Event;
use crate::executive::Executive;
use crate::observer::ObserverState;
use crate::stream::{RandomSource, StreamId};
use crate::types::{ElementId, Time};
use std::collections::HashMap;

// ─── Lifecycle phases ─────────────────────────────────────────

/// The tree-dispatched lifecycle phases. Dispatch is children-first
/// (post-order); each element's body is gated by its participation flag,
/// and a gated-off element still recurses into its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    BeforeExperiment,
    BeforeReplication,
    Initialize,
    RegisterConditionalActions,
    MonteCarlo,
    Update,
    ReplicationEnded,
    AfterReplication,
    AfterExperiment,
}

impl Phase {
    fn label(self) -> ObserverState {
        match self {
            Phase::BeforeExperiment => ObserverState::BeforeExperiment,
            Phase::BeforeReplication => ObserverState::BeforeReplication,
            Phase::Initialize => ObserverState::Initialized,
            Phase::RegisterConditionalActions => ObserverState::ConditionalActionRegistration,
            Phase::MonteCarlo => ObserverState::MonteCarlo,
            Phase::Update => ObserverState::Update,
            Phase::ReplicationEnded => ObserverState::ReplicationEnded,
            Phase::AfterReplication => ObserverState::AfterReplication,
            Phase::AfterExperiment => ObserverState::AfterExperiment,
        }
    }
}

// ─── Model ────────────────────────────────────────────────────

/// Root of the model-element tree.
///
/// Owns every element in an arena indexed by [`ElementId`]; upward pointers
/// are plain ids, so ownership runs root→leaves. Element names are unique
/// across the whole tree. Structural mutation is forbidden while the
/// simulation is running.
pub struct Model {
    name: String,
    elements: Vec<Option<ElementNode>>,
    names: HashMap<String, ElementId>,
    root: ElementId,
    running: bool,
    time_unit: f64,
    controls: HashMap<String, f64>,
    streams: Vec<Box<dyn RandomSource>>,
}

impl Model {
    /// Create a model whose root element carries the model's name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let root_node = ElementNode::new(0, name.clone(), None, None);
        let mut names = HashMap::new();
        names.insert(name.clone(), 0);
        Self {
            name,
            elements: vec![Some(root_node)],
            names,
            root: 0,
            running: false,
            time_unit: 1.0,
            controls: HashMap::new(),
            streams: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Scale factor of one simulated-time unit, relative to milliseconds.
    pub fn time_unit(&self) -> f64 {
        self.time_unit
    }

    pub fn set_time_unit(&mut self, unit: f64) -> SimResult<()> {
        if !unit.is_finite() || unit <= 0.0 {
            return Err(SimError::invalid_argument(format!(
                "time unit must be finite and positive, got {unit}"
            )));
        }
        self.time_unit = unit;
        Ok(())
    }

    /// Convert `amount` of the named unit (one of the [`crate::types::time_unit`]
    /// constants) into simulated-time units under this model's scale factor.
    pub fn convert_time(&self, amount: f64, unit: f64) -> Time {
        amount * unit / self.time_unit
    }

    // ─── Controls ─────────────────────────────────────────────

    pub fn control(&self, name: &str) -> Option<f64> {
        self.controls.get(name).copied()
    }

    pub(crate) fn set_controls(&mut self, controls: HashMap<String, f64>) {
        self.controls = controls;
    }

    // ─── Random sources ───────────────────────────────────────

    /// Register a random source with the model; elements draw from it by
    /// the returned id and the experiment flags orchestrate it.
    pub fn register_stream(&mut self, stream: Box<dyn RandomSource>) -> StreamId {
        self.streams.push(stream);
        self.streams.len() - 1
    }

    pub fn stream_mut(&mut self, id: StreamId) -> &mut dyn RandomSource {
        self.streams
            .get_mut(id)
            .expect("unknown stream id")
            .as_mut()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub(crate) fn for_each_stream(&mut self, mut f: impl FnMut(&mut dyn RandomSource)) {
        for stream in &mut self.streams {
            f(stream.as_mut());
        }
    }

    // ─── Element access ───────────────────────────────────────

    pub fn element(&self, id: ElementId) -> Option<&ElementNode> {
        self.elements.get(id).and_then(|slot| slot.as_ref())
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut ElementNode> {
        self.elements.get_mut(id).and_then(|slot| slot.as_mut())
    }

    pub fn find_element(&self, name: &str) -> Option<ElementId> {
        self.names.get(name).copied()
    }

    pub fn element_count(&self) -> usize {
        self.names.len()
    }

    /// All live element ids, in creation order.
    pub fn element_ids(&self) -> Vec<ElementId> {
        self.elements
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| i))
            .collect()
    }

    pub(crate) fn node(&self, id: ElementId) -> &ElementNode {
        self.element(id).expect("stale element id")
    }

    pub(crate) fn node_mut(&mut self, id: ElementId) -> &mut ElementNode {
        self.element_mut(id).expect("stale element id")
    }

    // ─── Structural mutation ──────────────────────────────────

    /// Add an element under `parent`. Names are unique model-wide and fixed
    /// for the element's lifetime.
    pub fn add_element(
        &mut self,
        parent: ElementId,
        name: impl Into<String>,
        behavior: Option<Box<dyn ModelBehavior>>,
    ) -> SimResult<ElementId> {
        let name = name.into();
        if self.running {
            return Err(SimError::illegal_state(
                "cannot add an element while the simulation is running",
            ));
        }
        if self.element(parent).is_none() {
            return Err(SimError::invalid_argument(format!(
                "parent element {parent} does not exist"
            )));
        }
        if self.names.contains_key(&name) {
            return Err(SimError::invalid_argument(format!(
                "duplicate element name '{name}'"
            )));
        }
        let id = self.elements.len();
        self.elements
            .push(Some(ElementNode::new(id, name.clone(), Some(parent), behavior)));
        self.names.insert(name, id);
        self.node_mut(parent).add_child(id);
        self.notify_root_structural(id, ObserverState::ModelElementAdded);
        Ok(id)
    }

    /// Add an element with the default `<kind>_<id>` name.
    pub fn add_element_with_default_name(
        &mut self,
        parent: ElementId,
        kind: &str,
        behavior: Option<Box<dyn ModelBehavior>>,
    ) -> SimResult<ElementId> {
        let name = format!("{kind}_{}", self.elements.len());
        self.add_element(parent, name, behavior)
    }

    /// Remove an element and all its descendants. Each detached node's own
    /// observers see `RemovedFromModel`; the root's observers see one
    /// `ModelElementRemoved` per detached node.
    pub fn remove_element(&mut self, id: ElementId) -> SimResult<()> {
        if self.running {
            return Err(SimError::illegal_state(
                "cannot remove an element while the simulation is running",
            ));
        }
        if id == self.root {
            return Err(SimError::invalid_argument("cannot remove the root element"));
        }
        if self.element(id).is_none() {
            return Err(SimError::invalid_argument(format!(
                "element {id} does not exist"
            )));
        }

        let parent = self.node(id).parent().expect("non-root node has a parent");
        self.node_mut(parent).remove_child(id);

        let mut detached = Vec::new();
        collect_subtree(self, id, &mut detached);
        for &node_id in &detached {
            self.notify_element(node_id, ObserverState::RemovedFromModel, None);
            self.notify_root_structural(node_id, ObserverState::ModelElementRemoved);
            let node = self.elements[node_id].take().expect("collected live node");
            self.names.remove(node.name());
        }
        Ok(())
    }

    // ─── Observer notification ────────────────────────────────

    pub(crate) fn notify_element(
        &mut self,
        id: ElementId,
        label: ObserverState,
        event: Option<&Event>,
    ) {
        let node = self.node_mut(id);
        node.set_observer_state(label);
        for observer in &mut node.observers {
            observer.notify(id, label, event);
        }
    }

    /// Structural change announcement: the root's observers hear about the
    /// affected element.
    fn notify_root_structural(&mut self, subject: ElementId, label: ObserverState) {
        let root = self.root;
        let node = self.node_mut(root);
        node.set_observer_state(label);
        for observer in &mut node.observers {
            observer.notify(subject, label, None);
        }
    }

    // ─── Pre-order labels ─────────────────────────────────────

    /// Assign (left, right) labels by a pre-order walk. Called before each
    /// experiment; supports O(1) ancestor/descendant queries.
    pub fn mark_pre_order_labels(&mut self) {
        let mut counter = 0;
        mark_labels_at(self, self.root, &mut counter);
    }

    /// O(1) ancestor test via the label intervals. Labels must be current
    /// (assigned since the last structural change).
    pub fn is_ancestor_of(&self, ancestor: ElementId, descendant: ElementId) -> bool {
        let a = self.node(ancestor);
        let d = self.node(descendant);
        a.left_label() < d.left_label() && d.right_label() < a.right_label()
    }

    // ─── Warm-up ──────────────────────────────────────────────

    /// The warm-up length that effectively applies to `id`: the length of
    /// the nearest self-or-ancestor that schedules its own warm-up, or 0.
    pub fn effective_warm_up_time(&self, id: ElementId) -> Time {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node(current);
            if !node.flags.warm_up {
                return node.warm_up().length;
            }
            cursor = node.parent();
        }
        0.0
    }
}

fn collect_subtree(model: &Model, id: ElementId, out: &mut Vec<ElementId>) {
    for &child in model.node(id).children() {
        collect_subtree(model, child, out);
    }
    out.push(id);
}

fn mark_labels_at(model: &mut Model, id: ElementId, counter: &mut u32) {
    let left = *counter;
    *counter += 1;
    let children: Vec<ElementId> = model.node(id).children().to_vec();
    for child in children {
        mark_labels_at(model, child, counter);
    }
    let right = *counter;
    *counter += 1;
    model.node_mut(id).set_labels(left, right);
}

// ─── Lifecycle dispatch ───────────────────────────────────────

/// Drive one lifecycle phase down the whole tree, children first.
pub fn dispatch_phase(model: &mut Model, executive: &mut Executive, phase: Phase) {
    let root = model.root();
    dispatch_at(model, executive, root, phase);
}

fn dispatch_at(model: &mut Model, executive: &mut Executive, id: ElementId, phase: Phase) {
    let children: Vec<ElementId> = model.node(id).children().to_vec();
    for child in children {
        dispatch_at(model, executive, child, phase);
    }
    if participates(model.node(id), phase) {
        invoke_body(model, executive, id, phase);
        model.notify_element(id, phase.label(), None);
    }
}

fn participates(node: &ElementNode, phase: Phase) -> bool {
    match phase {
        Phase::BeforeExperiment => node.flags.before_experiment,
        Phase::BeforeReplication => node.flags.before_replication,
        Phase::Initialize => node.flags.initialize,
        Phase::RegisterConditionalActions => true,
        Phase::MonteCarlo => node.flags.monte_carlo,
        Phase::Update => node.flags.update_notifications,
        Phase::ReplicationEnded => node.flags.replication_ended,
        Phase::AfterReplication => node.flags.after_replication,
        Phase::AfterExperiment => node.flags.after_experiment,
    }
}

fn invoke_body(model: &mut Model, executive: &mut Executive, id: ElementId, phase: Phase) {
    let Some(mut behavior) = model.node_mut(id).take_behavior() else {
        return;
    };
    {
        let mut ctx = ElementContext {
            element: id,
            model,
            executive,
        };
        match phase {
            Phase::BeforeExperiment => behavior.before_experiment(&mut ctx),
            Phase::BeforeReplication => behavior.before_replication(&mut ctx),
            Phase::Initialize => behavior.initialize(&mut ctx),
            Phase::RegisterConditionalActions => behavior.register_conditional_actions(&mut ctx),
            Phase::MonteCarlo => behavior.monte_carlo(&mut ctx),
            Phase::Update => behavior.update(&mut ctx),
            Phase::ReplicationEnded => behavior.replication_ended(&mut ctx),
            Phase::AfterReplication => behavior.after_replication(&mut ctx),
            Phase::AfterExperiment => behavior.after_experiment(&mut ctx),
        }
    }
    model.node_mut(id).put_behavior(behavior);
}

// ─── Warm-up & timed-update events ────────────────────────────

/// Schedule the per-replication warm-up and timed-update events for every
/// element that configures them. Called once per replication, after the
/// executive has been initialized.
pub(crate) fn schedule_replication_events(
    model: &mut Model,
    executive: &mut Executive,
) -> SimResult<()> {
    for id in model.element_ids() {
        let warm_up = model.node(id).warm_up();
        if warm_up.length > 0.0 {
            let name = format!("warm_up_{}", model.node(id).name());
            let event = executive.schedule(
                id,
                warm_up.length,
                warm_up.priority,
                name,
                None,
                Box::new(move |executive, model, _event| {
                    warm_up_traverse(model, executive, id);
                }),
            )?;
            model.node_mut(id).warm_up_event = Some(event);
        }

        let timed = model.node(id).timed_update();
        if timed.interval > 0.0 {
            let name = format!("timed_update_{}", model.node(id).name());
            let event = executive.schedule(
                id,
                timed.interval,
                timed.priority,
                name,
                None,
                Box::new(move |executive, model, event| {
                    timed_update_traverse(model, executive, id);
                    let interval = model.node(id).timed_update().interval;
                    if interval > 0.0 {
                        event.reschedule(interval);
                    }
                }),
            )?;
            model.node_mut(id).timed_update_event = Some(event);
        }
    }
    Ok(())
}

/// Drop the per-replication event registrations: cancel whatever is still
/// scheduled and clear the handles.
pub(crate) fn clear_replication_events(model: &mut Model, executive: &mut Executive) {
    for id in model.element_ids() {
        if let Some(event) = model.node_mut(id).warm_up_event.take() {
            if executive.pending_events().contains(event) {
                let _ = executive.cancel(event);
            }
        }
        if let Some(event) = model.node_mut(id).timed_update_event.take() {
            if executive.pending_events().contains(event) {
                let _ = executive.cancel(event);
            }
        }
    }
}

/// Warm-up dispatch rooted at the element whose warm-up event fired:
/// children that inherit the parent's warm-up first, then the element
/// itself.
pub(crate) fn warm_up_traverse(model: &mut Model, executive: &mut Executive, id: ElementId) {
    let children: Vec<ElementId> = model.node(id).children().to_vec();
    for child in children {
        if model.node(child).flags.warm_up {
            warm_up_traverse(model, executive, child);
        }
    }
    if let Some(mut behavior) = model.node_mut(id).take_behavior() {
        let mut ctx = ElementContext {
            element: id,
            model,
            executive,
        };
        behavior.warm_up(&mut ctx);
        model.node_mut(id).put_behavior(behavior);
    }
    model.notify_element(id, ObserverState::WarmUp, None);
}

/// Timed-update dispatch: the element's own body first, then children that
/// have no timed-update event of their own (avoiding double firings).
pub(crate) fn timed_update_traverse(model: &mut Model, executive: &mut Executive, id: ElementId) {
    if model.node(id).flags.timed_update {
        if let Some(mut behavior) = model.node_mut(id).take_behavior() {
            let mut ctx = ElementContext {
                element: id,
                model,
                executive,
            };
            behavior.timed_update(&mut ctx);
            model.node_mut(id).put_behavior(behavior);
        }
        model.notify_element(id, ObserverState::TimedUpdate, None);
    }
    let children: Vec<ElementId> = model.node(id).children().to_vec();
    for child in children {
        if model.node(child).timed_update_event().is_none() {
            timed_update_traverse(model, executive, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ModelObserver;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Recorder {
        fn boxed(label: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Option<Box<dyn ModelBehavior>> {
            Some(Box::new(Recorder {
                label,
                log: log.clone(),
            }))
        }

        fn push(&mut self, phase: &str) {
            self.log.borrow_mut().push(format!("{phase}:{}", self.label));
        }
    }

    impl ModelBehavior for Recorder {
        fn initialize(&mut self, _ctx: &mut ElementContext<'_>) {
            self.push("init");
        }
        fn warm_up(&mut self, _ctx: &mut ElementContext<'_>) {
            self.push("warm_up");
        }
        fn timed_update(&mut self, _ctx: &mut ElementContext<'_>) {
            self.push("timed");
        }
    }

    struct LabelSink {
        seen: Rc<RefCell<Vec<(ElementId, ObserverState)>>>,
    }

    impl ModelObserver for LabelSink {
        fn notify(&mut self, source: ElementId, label: ObserverState, _event: Option<&Event>) {
            self.seen.borrow_mut().push((source, label));
        }
    }

    fn running_executive() -> Executive {
        let mut executive = Executive::new();
        executive.initialize().unwrap();
        executive
    }

    #[test]
    fn time_conversion_respects_the_model_scale() {
        use crate::types::time_unit;

        let mut model = Model::new("m");
        // One simulated-time unit is one second.
        model.set_time_unit(time_unit::SECOND).unwrap();
        assert_eq!(model.convert_time(2.0, time_unit::MINUTE), 120.0);
        assert_eq!(model.convert_time(500.0, time_unit::MILLISECOND), 0.5);

        assert!(model.set_time_unit(0.0).is_err());
    }

    #[test]
    fn names_are_unique_model_wide() {
        let mut model = Model::new("m");
        let root = model.root();
        model.add_element(root, "queue", None).unwrap();
        let err = model.add_element(root, "queue", None).unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
    }

    #[test]
    fn default_names_carry_kind_and_id() {
        let mut model = Model::new("m");
        let root = model.root();
        let id = model
            .add_element_with_default_name(root, "Counter", None)
            .unwrap();
        assert_eq!(model.node(id).name(), format!("Counter_{id}"));
        assert_eq!(model.find_element(&format!("Counter_{id}")), Some(id));
    }

    #[test]
    fn structural_mutation_while_running_is_illegal() {
        let mut model = Model::new("m");
        let root = model.root();
        let child = model.add_element(root, "child", None).unwrap();

        model.set_running(true);
        assert!(matches!(
            model.add_element(root, "late", None),
            Err(SimError::IllegalState(_))
        ));
        assert!(matches!(
            model.remove_element(child),
            Err(SimError::IllegalState(_))
        ));
    }

    #[test]
    fn removal_detaches_the_whole_subtree_with_notifications() {
        let mut model = Model::new("m");
        let root = model.root();
        let a = model.add_element(root, "a", None).unwrap();
        let a1 = model.add_element(a, "a1", None).unwrap();
        let b = model.add_element(root, "b", None).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        model
            .node_mut(a1)
            .attach_observer(Box::new(LabelSink { seen: seen.clone() }));

        model.remove_element(a).unwrap();
        assert!(model.element(a).is_none());
        assert!(model.element(a1).is_none());
        assert!(model.element(b).is_some());
        assert_eq!(model.find_element("a"), None);
        assert_eq!(model.find_element("a1"), None);
        assert_eq!(
            *seen.borrow(),
            vec![(a1, ObserverState::RemovedFromModel)],
            "each detached node hears its own removal"
        );

        // The freed name can be reused after removal.
        model.add_element(root, "a", None).unwrap();
    }

    #[test]
    fn initialize_dispatch_is_post_order() {
        // M has child A (children A1, A2) and child B.
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut model = Model::new("m");
        let root = model.root();
        let a = model
            .add_element(root, "a", Recorder::boxed("a", &log))
            .unwrap();
        model
            .add_element(a, "a1", Recorder::boxed("a1", &log))
            .unwrap();
        model
            .add_element(a, "a2", Recorder::boxed("a2", &log))
            .unwrap();
        model
            .add_element(root, "b", Recorder::boxed("b", &log))
            .unwrap();

        let mut executive = running_executive();
        dispatch_phase(&mut model, &mut executive, Phase::Initialize);

        let order = log.borrow().clone();
        let pos = |needle: &str| order.iter().position(|s| s == needle).unwrap();
        assert!(pos("init:a1") < pos("init:a"));
        assert!(pos("init:a2") < pos("init:a"));
        assert!(order.iter().all(|s| s.starts_with("init:")));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn gated_off_element_still_recurses() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut model = Model::new("m");
        let root = model.root();
        let a = model
            .add_element(root, "a", Recorder::boxed("a", &log))
            .unwrap();
        model
            .add_element(a, "a1", Recorder::boxed("a1", &log))
            .unwrap();

        model.node_mut(a).flags.initialize = false;
        let mut executive = running_executive();
        dispatch_phase(&mut model, &mut executive, Phase::Initialize);

        assert_eq!(*log.borrow(), vec!["init:a1"]);
    }

    #[test]
    fn dispatch_emits_the_phase_label() {
        let mut model = Model::new("m");
        let root = model.root();
        let a = model.add_element(root, "a", None).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        model
            .node_mut(a)
            .attach_observer(Box::new(LabelSink { seen: seen.clone() }));

        let mut executive = running_executive();
        dispatch_phase(&mut model, &mut executive, Phase::BeforeReplication);

        assert_eq!(*seen.borrow(), vec![(a, ObserverState::BeforeReplication)]);
        assert_eq!(
            model.node(a).observer_state(),
            Some(ObserverState::BeforeReplication)
        );
    }

    #[test]
    fn pre_order_labels_nest_descendants() {
        let mut model = Model::new("m");
        let root = model.root();
        let a = model.add_element(root, "a", None).unwrap();
        let a1 = model.add_element(a, "a1", None).unwrap();
        let b = model.add_element(root, "b", None).unwrap();

        model.mark_pre_order_labels();

        let check = |v: ElementId, w: ElementId| {
            assert!(
                model.node(v).left_label() < model.node(w).left_label(),
                "left({v}) < left({w})"
            );
            assert!(
                model.node(w).right_label() < model.node(v).right_label(),
                "right({w}) < right({v})"
            );
        };
        check(root, a);
        check(root, a1);
        check(root, b);
        check(a, a1);

        assert!(model.is_ancestor_of(root, a1));
        assert!(model.is_ancestor_of(a, a1));
        assert!(!model.is_ancestor_of(a, b));
        assert!(!model.is_ancestor_of(a1, a));
    }

    #[test]
    fn effective_warm_up_follows_the_nearest_self_scheduler() {
        let mut model = Model::new("m");
        let root = model.root();
        let a = model.add_element(root, "a", None).unwrap();
        let a1 = model.add_element(a, "a1", None).unwrap();
        let b = model.add_element(root, "b", None).unwrap();

        model.node_mut(a).set_warm_up(40.0);

        assert_eq!(model.effective_warm_up_time(a1), 40.0, "inherited from a");
        assert_eq!(model.effective_warm_up_time(a), 40.0);
        assert_eq!(model.effective_warm_up_time(b), 0.0, "no warm-up anywhere");
    }

    #[test]
    fn warm_up_event_fires_scheduler_and_inheriting_children_only() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut model = Model::new("m");
        let root = model.root();
        let a = model
            .add_element(root, "a", Recorder::boxed("a", &log))
            .unwrap();
        let a1 = model
            .add_element(a, "a1", Recorder::boxed("a1", &log))
            .unwrap();
        let a2 = model
            .add_element(a, "a2", Recorder::boxed("a2", &log))
            .unwrap();

        model.node_mut(a).set_warm_up(10.0);
        // a2 schedules its own warm-up later; a's event must not reach it.
        model.node_mut(a2).set_warm_up(20.0);
        let _ = a1;

        let mut executive = running_executive();
        schedule_replication_events(&mut model, &mut executive).unwrap();
        executive.run(&mut model).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["warm_up:a1", "warm_up:a", "warm_up:a2"],
            "a's event covers a1 and a at t=10; a2 fires alone at t=20"
        );
    }

    #[test]
    fn timed_update_rearms_and_recurses_into_unscheduled_children() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut model = Model::new("m");
        let root = model.root();
        let a = model
            .add_element(root, "a", Recorder::boxed("a", &log))
            .unwrap();
        model
            .add_element(a, "a1", Recorder::boxed("a1", &log))
            .unwrap();
        let a2 = model
            .add_element(a, "a2", Recorder::boxed("a2", &log))
            .unwrap();

        model.node_mut(a).set_timed_update(5.0);
        // a2 runs its own (longer) cadence; a's firings must skip it.
        model.node_mut(a2).set_timed_update(10.0);

        let mut executive = running_executive();
        schedule_replication_events(&mut model, &mut executive).unwrap();
        executive.schedule_end(10.0, root).unwrap();
        executive.run(&mut model).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "timed:a",
                "timed:a1",
                "timed:a",
                "timed:a1",
                "timed:a2",
            ],
            "a at 5 and 10 covering a1; a2 only from its own event at 10"
        );
    }
}
