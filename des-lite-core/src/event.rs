use crate::error::{SimError, SimResult};
use crate::executive::Executive;
use crate::model::Model;
use crate::types::{ElementId, EventId, Priority, Time};
use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Callback invoked when an event is dispatched. Receives the executive (to
/// schedule further events), the model, and the event itself.
pub type EventAction = Box<dyn FnMut(&mut Executive, &mut Model, &mut Event)>;

// ─── Ordering key ─────────────────────────────────────────────

/// The total order over scheduled events: time ascending, then priority
/// ascending, then id ascending. Ids are unique, so ties are impossible.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventKey {
    pub time: Time,
    pub priority: Priority,
    pub id: EventId,
}

impl Eq for EventKey {}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Times are validated finite at insertion, so the comparison is total.
        self.time
            .partial_cmp(&other.time)
            .expect("non-finite event time in event set")
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.id.cmp(&other.id))
    }
}

// ─── Event ────────────────────────────────────────────────────

/// A scheduled unit of work.
///
/// The (time, priority, id) tuple is immutable while the event sits in the
/// event set; the mutators are confined to this crate so user code only sees
/// the read-only accessors.
pub struct Event {
    id: EventId,
    time: Time,
    priority: Priority,
    name: String,
    owner: ElementId,
    payload: Option<Box<dyn Any>>,
    action: Option<EventAction>,
    scheduled: bool,
    canceled: bool,
    reschedule_after: Option<Time>,
}

impl Event {
    pub(crate) fn new(
        id: EventId,
        time: Time,
        priority: Priority,
        name: String,
        owner: ElementId,
        payload: Option<Box<dyn Any>>,
        action: EventAction,
    ) -> Self {
        Self {
            id,
            time,
            priority,
            name,
            owner,
            payload,
            action: Some(action),
            scheduled: false,
            canceled: false,
            reschedule_after: None,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> ElementId {
        self.owner
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Typed view of the optional payload.
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }

    /// Request re-insertion `delta` after the current time once this event's
    /// action returns. Only meaningful from within the action of a dispatched
    /// event; the executive applies it and clears the canceled flag.
    pub fn reschedule(&mut self, delta: Time) {
        self.reschedule_after = Some(delta);
    }

    pub(crate) fn key(&self) -> EventKey {
        EventKey {
            time: self.time,
            priority: self.priority,
            id: self.id,
        }
    }

    pub(crate) fn set_time(&mut self, time: Time) {
        debug_assert!(!self.scheduled, "time of a scheduled event is immutable");
        self.time = time;
    }

    pub(crate) fn set_scheduled(&mut self, scheduled: bool) {
        self.scheduled = scheduled;
    }

    pub(crate) fn set_canceled(&mut self, canceled: bool) {
        self.canceled = canceled;
    }

    pub(crate) fn take_action(&mut self) -> Option<EventAction> {
        self.action.take()
    }

    pub(crate) fn put_action(&mut self, action: EventAction) {
        self.action = Some(action);
    }

    pub(crate) fn take_reschedule(&mut self) -> Option<Time> {
        self.reschedule_after.take()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("time", &self.time)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("scheduled", &self.scheduled)
            .field("canceled", &self.canceled)
            .finish()
    }
}

// ─── EventSet ─────────────────────────────────────────────────

/// Ordered container of scheduled events, keyed by (time, priority, id).
///
/// Cancellation is mark-and-skip: a canceled event stays in the set until it
/// would have been dispatched, at which point `pop` quietly discards it.
#[derive(Default)]
pub struct EventSet {
    events: BTreeMap<EventKey, Event>,
    index: HashMap<EventId, EventKey>,
}

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event. The event must not already be scheduled; it becomes
    /// scheduled on insertion.
    pub(crate) fn insert(&mut self, mut event: Event) {
        debug_assert!(!event.is_scheduled(), "event already scheduled");
        event.set_scheduled(true);
        let key = event.key();
        if let Some(prior) = self.index.insert(event.id(), key) {
            // Equal ids imply identity; two live entries sharing an id means
            // the kernel's id assignment is corrupt.
            panic!(
                "event id collision: id {} already scheduled under {:?}",
                event.id(),
                prior
            );
        }
        self.events.insert(key, event);
    }

    /// Earliest non-canceled event, without removing it.
    pub fn peek(&self) -> Option<&Event> {
        self.events.values().find(|e| !e.is_canceled())
    }

    /// Remove and return the earliest non-canceled event. Canceled events
    /// encountered on the way are discarded.
    pub(crate) fn pop(&mut self) -> Option<Event> {
        while let Some((&key, _)) = self.events.iter().next() {
            let mut event = self.events.remove(&key).unwrap();
            self.index.remove(&event.id());
            event.set_scheduled(false);
            if !event.is_canceled() {
                return Some(event);
            }
        }
        None
    }

    /// Mark a scheduled event canceled. Its id remains consumed and its
    /// action will never be invoked.
    pub(crate) fn cancel(&mut self, id: EventId) -> SimResult<()> {
        let key = self.index.get(&id).ok_or_else(|| {
            SimError::illegal_state(format!("cannot cancel event {id}: not scheduled"))
        })?;
        self.events
            .get_mut(key)
            .expect("index and event map out of sync")
            .set_canceled(true);
        Ok(())
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.index.contains_key(&id)
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.index.clear();
    }

    /// Number of events held, canceled entries included.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
