use crate::error::{SimError, SimResult};
use crate::executive::Executive;
use crate::model::Model;
use crate::types::{ActionId, Priority, DEFAULT_PRIORITY};
use std::collections::{BTreeMap, HashMap};

/// A state-dependent action scanned between event-time advances.
///
/// `test_condition` is a pure predicate over model state; `action` fires the
/// consequence and may schedule events or mutate the model. Registrations
/// are ordered by (priority, id), smaller first.
pub trait ConditionalAction {
    fn test_condition(&mut self, model: &Model) -> bool;
    fn action(&mut self, executive: &mut Executive, model: &mut Model);
}

/// Registry and scanner for conditional actions (the C-phase).
///
/// `run_scans` sweeps the registered actions in (priority, id) order until a
/// full pass fires nothing, so an action that enables another's precondition
/// is observed within the same phase. The scan cap catches predicates that
/// oscillate instead of reaching a fixed point.
pub struct ConditionalActionProcessor {
    actions: BTreeMap<(Priority, ActionId), Box<dyn ConditionalAction>>,
    priorities: HashMap<ActionId, Priority>,
    next_id: ActionId,
    max_scans: u32,
    enforce_max_scans: bool,
    last_scan_count: u32,
}

impl Default for ConditionalActionProcessor {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

impl ConditionalActionProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A processor whose id assignment continues from `next_id`. Used when
    /// the executive swaps the processor out for the duration of a scan so
    /// that actions registered mid-phase do not collide.
    pub(crate) fn starting_at(next_id: ActionId) -> Self {
        Self {
            actions: BTreeMap::new(),
            priorities: HashMap::new(),
            next_id,
            max_scans: 1_000,
            enforce_max_scans: true,
            last_scan_count: 0,
        }
    }

    pub fn register(&mut self, action: Box<dyn ConditionalAction>) -> ActionId {
        self.register_with_priority(action, DEFAULT_PRIORITY)
    }

    pub fn register_with_priority(
        &mut self,
        action: Box<dyn ConditionalAction>,
        priority: Priority,
    ) -> ActionId {
        let id = self.next_id;
        self.next_id += 1;
        self.actions.insert((priority, id), action);
        self.priorities.insert(id, priority);
        id
    }

    pub fn unregister(&mut self, id: ActionId) -> SimResult<()> {
        let priority = self.priorities.remove(&id).ok_or_else(|| {
            SimError::invalid_argument(format!("conditional action {id} is not registered"))
        })?;
        self.actions.remove(&(priority, id));
        Ok(())
    }

    pub fn unregister_all(&mut self) {
        self.actions.clear();
        self.priorities.clear();
    }

    pub fn change_priority(&mut self, id: ActionId, priority: Priority) -> SimResult<()> {
        let old = self.priorities.get_mut(&id).ok_or_else(|| {
            SimError::invalid_argument(format!("conditional action {id} is not registered"))
        })?;
        let action = self
            .actions
            .remove(&(*old, id))
            .expect("priority index and action map out of sync");
        *old = priority;
        self.actions.insert((priority, id), action);
        Ok(())
    }

    pub fn set_max_scans(&mut self, max_scans: u32) -> SimResult<()> {
        if max_scans == 0 {
            return Err(SimError::invalid_argument("max scans must be positive"));
        }
        self.max_scans = max_scans;
        Ok(())
    }

    pub fn set_max_scan_flag(&mut self, enforce: bool) {
        self.enforce_max_scans = enforce;
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Scan count of the most recent completed phase.
    pub fn last_scan_count(&self) -> u32 {
        self.last_scan_count
    }

    pub(crate) fn next_id_hint(&self) -> ActionId {
        self.next_id
    }

    /// Merge registrations made while this processor was swapped out.
    pub(crate) fn absorb(&mut self, other: ConditionalActionProcessor) {
        for (key, action) in other.actions {
            self.priorities.insert(key.1, key.0);
            self.actions.insert(key, action);
        }
        self.next_id = self.next_id.max(other.next_id);
    }

    /// Run the C-phase to a fixed point.
    pub(crate) fn run_scans(
        &mut self,
        executive: &mut Executive,
        model: &mut Model,
    ) -> SimResult<()> {
        let mut scans = 0u32;
        loop {
            scans += 1;
            let mut fired_any = false;
            for action in self.actions.values_mut() {
                if action.test_condition(model) {
                    action.action(executive, model);
                    fired_any = true;
                }
            }
            if self.enforce_max_scans && scans >= self.max_scans {
                self.last_scan_count = scans;
                return Err(SimError::ScanLimitExceeded {
                    scans,
                    max_scans: self.max_scans,
                });
            }
            if !fired_any {
                break;
            }
        }
        self.last_scan_count = scans;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Fires while `armed` is set, clearing it and optionally arming another
    /// flag; records each firing in `log`.
    struct FlagAction {
        label: &'static str,
        armed: Rc<Cell<bool>>,
        arms: Option<Rc<Cell<bool>>>,
        log: Rc<std::cell::RefCell<Vec<&'static str>>>,
    }

    impl ConditionalAction for FlagAction {
        fn test_condition(&mut self, _model: &Model) -> bool {
            self.armed.get()
        }

        fn action(&mut self, _executive: &mut Executive, _model: &mut Model) {
            self.armed.set(false);
            if let Some(next) = &self.arms {
                next.set(true);
            }
            self.log.borrow_mut().push(self.label);
        }
    }

    fn fixture() -> (Executive, Model) {
        (Executive::new(), Model::new("test_model"))
    }

    #[test]
    fn chained_enablement_resolves_in_one_phase() {
        let (mut executive, mut model) = fixture();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let x_armed = Rc::new(Cell::new(true));
        let y_armed = Rc::new(Cell::new(false));

        let mut proc = ConditionalActionProcessor::new();
        proc.register(Box::new(FlagAction {
            label: "x",
            armed: x_armed,
            arms: Some(y_armed.clone()),
            log: log.clone(),
        }));
        proc.register(Box::new(FlagAction {
            label: "y",
            armed: y_armed,
            arms: None,
            log: log.clone(),
        }));

        proc.run_scans(&mut executive, &mut model).unwrap();
        // X fires on the first scan and arms Y; Y fires in the same scan
        // (it is ordered after X), so the second scan finds quiescence.
        assert_eq!(*log.borrow(), vec!["x", "y"]);
        assert!(proc.last_scan_count() <= 2);
    }

    #[test]
    fn priority_orders_the_sweep() {
        let (mut executive, mut model) = fixture();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut proc = ConditionalActionProcessor::new();

        let late = Rc::new(Cell::new(true));
        let early = Rc::new(Cell::new(true));
        proc.register_with_priority(
            Box::new(FlagAction {
                label: "late",
                armed: late,
                arms: None,
                log: log.clone(),
            }),
            50,
        );
        proc.register_with_priority(
            Box::new(FlagAction {
                label: "early",
                armed: early,
                arms: None,
                log: log.clone(),
            }),
            1,
        );

        proc.run_scans(&mut executive, &mut model).unwrap();
        assert_eq!(*log.borrow(), vec!["early", "late"]);
    }

    /// An oscillator that always claims to be enabled.
    struct Oscillator;

    impl ConditionalAction for Oscillator {
        fn test_condition(&mut self, _model: &Model) -> bool {
            true
        }

        fn action(&mut self, _executive: &mut Executive, _model: &mut Model) {}
    }

    #[test]
    fn oscillating_predicate_hits_the_scan_limit() {
        let (mut executive, mut model) = fixture();
        let mut proc = ConditionalActionProcessor::new();
        proc.set_max_scans(5).unwrap();
        proc.register(Box::new(Oscillator));

        let err = proc.run_scans(&mut executive, &mut model).unwrap_err();
        assert!(matches!(
            err,
            SimError::ScanLimitExceeded {
                scans: 5,
                max_scans: 5
            }
        ));
    }

    #[test]
    fn scan_limit_not_enforced_when_flag_off_and_fixed_point_reached() {
        let (mut executive, mut model) = fixture();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let armed = Rc::new(Cell::new(true));

        let mut proc = ConditionalActionProcessor::new();
        proc.set_max_scans(1).unwrap();
        proc.set_max_scan_flag(false);
        proc.register(Box::new(FlagAction {
            label: "only",
            armed,
            arms: None,
            log: log.clone(),
        }));

        proc.run_scans(&mut executive, &mut model).unwrap();
        assert_eq!(*log.borrow(), vec!["only"]);
    }

    #[test]
    fn register_unregister_round_trip() {
        let mut proc = ConditionalActionProcessor::new();
        let id = proc.register(Box::new(Oscillator));
        assert_eq!(proc.len(), 1);

        proc.unregister(id).unwrap();
        assert!(proc.is_empty());
        assert!(matches!(
            proc.unregister(id),
            Err(SimError::InvalidArgument(_))
        ));
    }

    #[test]
    fn change_priority_reorders() {
        let (mut executive, mut model) = fixture();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let a = Rc::new(Cell::new(true));
        let b = Rc::new(Cell::new(true));

        let mut proc = ConditionalActionProcessor::new();
        let a_id = proc.register(Box::new(FlagAction {
            label: "a",
            armed: a,
            arms: None,
            log: log.clone(),
        }));
        proc.register(Box::new(FlagAction {
            label: "b",
            armed: b,
            arms: None,
            log: log.clone(),
        }));

        // Same priority: a (smaller id) would sweep first. Demote it.
        proc.change_priority(a_id, 100).unwrap();
        proc.run_scans(&mut executive, &mut model).unwrap();
        assert_eq!(*log.borrow(), vec!["b", "a"]);
    }
}
