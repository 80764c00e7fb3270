use crate::types::{ElementId, EventId, Time};
use thiserror::Error;

/// Error type for the public kernel API.
///
/// Invariant violations inside the kernel (time regression on dispatch, id
/// collision with differing identity) surface as `OrderingViolation` and
/// abort the run; the remaining variants are caller errors.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Event `id` (owned by `owner`) was popped at `event_time` while the
    /// clock already stood at `current_time`.
    #[error(
        "ordering violation: event {id} '{name}' (owner {owner}) at t={event_time} \
         precedes current time {current_time}"
    )]
    OrderingViolation {
        id: EventId,
        name: String,
        owner: ElementId,
        event_time: Time,
        current_time: Time,
    },

    #[error("no step available: {0}")]
    NoSuchStep(String),

    #[error("conditional-action scan limit exceeded after {scans} scans (max {max_scans})")]
    ScanLimitExceeded { scans: u32, max_scans: u32 },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        SimError::InvalidArgument(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        SimError::IllegalState(msg.into())
    }
}
