//! des-lite-core: a discrete-event simulation kernel.
//!
//! The kernel advances simulated time by repeatedly extracting the earliest
//! pending event from a time-ordered [`event::EventSet`] and dispatching it
//! (the B-phase); between time advances it sweeps registered
//! [`conditional::ConditionalAction`]s to a fixed point (the C-phase).
//! Lifecycle is driven by a shared [`iterative::IterativeProcess`] state
//! machine: the [`executive::Executive`] steps events, the
//! [`simulation::Simulation`] steps replications, and the
//! [`model::Model`] tree receives the per-phase callbacks in between.
//!
//! Everything runs single-threaded and cooperatively: event actions run to
//! completion on the driver thread and there are no suspension points.

pub mod conditional;
pub mod element;
pub mod error;
pub mod event;
pub mod executive;
pub mod experiment;
pub mod iterative;
pub mod model;
pub mod observer;
pub mod simulation;
pub mod state;
pub mod stream;
pub mod types;

pub use conditional::{ConditionalAction, ConditionalActionProcessor};
pub use element::{
    ElementContext, ElementNode, ModelBehavior, ParticipationFlags, TimedUpdateConfig,
    WarmUpConfig,
};
pub use error::{SimError, SimResult};
pub use event::{Event, EventAction, EventSet};
pub use executive::{ExecutedEvent, Executive};
pub use experiment::Experiment;
pub use iterative::{IterativeProcess, IterativeState};
pub use model::{dispatch_phase, Model, Phase};
pub use observer::{ModelObserver, ObserverState, TraceRecord, TraceReport};
pub use simulation::Simulation;
pub use state::{SojournObserver, State, StateSnapshot};
pub use stream::{RandomSource, SplitStream, StreamId};
pub use types::{
    time_unit, ActionId, ElementId, EndingStatus, EventId, Priority, Time, BATCH_PRIORITY,
    DEFAULT_PRIORITY, END_REPLICATION_PRIORITY, TIMED_UPDATE_PRIORITY, WARMUP_PRIORITY,
};
