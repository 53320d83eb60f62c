use thiserror::Error;
use tutorslot_common::{exit_code, BoxedError, ExitStatus};

use crate::slot::{Role, SlotId, SlotState};

/// Errors raised by the slot registry.
#[derive(Error, Debug)]
pub enum BookingError {
    /// Unknown slot id. Not retried.
    #[error("Slot not found: {slot_id}")]
    NotFound { slot_id: SlotId },

    /// The transition is not legal from the slot's current state.
    #[error("Cannot {operation} slot {slot_id}: slot is {current}")]
    InvalidState {
        slot_id: SlotId,
        operation: &'static str,
        current: SlotState,
    },

    /// Guarded cancel refused; the slot is unchanged.
    #[error("Cannot cancel slot {slot_id}: {counterparty} {email} has already accepted")]
    CounterpartyAccepted {
        slot_id: SlotId,
        counterparty: Role,
        email: String,
    },

    /// The actor is not the attendee recorded for the stated role.
    #[error("{email} is not the {role} booked on slot {slot_id}")]
    ActorMismatch {
        slot_id: SlotId,
        email: String,
        role: Role,
    },

    /// A tutor cannot staff a slot they booked as its student.
    #[error("{email} is already the student on slot {slot_id}")]
    SameParty { slot_id: SlotId, email: String },

    #[error("Invalid email address: {0:?}")]
    InvalidEmail(String),

    /// The configured look-ahead window cannot be turned into a time range.
    #[error("Invalid lookahead of {days} days")]
    InvalidLookahead { days: i64 },

    /// The calendar call failed. Any local transition has been rolled back.
    #[error("Calendar service failed to {operation} {target}: {source}")]
    RemoteService {
        operation: &'static str,
        target: String,
        #[source]
        source: BoxedError,
    },
}

impl BookingError {
    pub(crate) fn not_found(slot_id: &str) -> Self {
        BookingError::NotFound {
            slot_id: slot_id.to_string(),
        }
    }

    pub(crate) fn invalid_state(slot_id: &str, operation: &'static str, current: SlotState) -> Self {
        BookingError::InvalidState {
            slot_id: slot_id.to_string(),
            operation,
            current,
        }
    }

    pub(crate) fn remote<E>(operation: &'static str, target: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BookingError::RemoteService {
            operation,
            target: target.to_string(),
            source: BoxedError(Box::new(source)),
        }
    }
}

impl ExitStatus for BookingError {
    fn exit_code(&self) -> i32 {
        match self {
            BookingError::NotFound { .. } => exit_code::NOT_FOUND,
            BookingError::InvalidState { .. }
            | BookingError::CounterpartyAccepted { .. }
            | BookingError::ActorMismatch { .. }
            | BookingError::SameParty { .. }
            | BookingError::InvalidEmail(_) => exit_code::REJECTED,
            BookingError::InvalidLookahead { .. } => exit_code::CONFIG,
            BookingError::RemoteService { .. } => exit_code::REMOTE,
        }
    }
}
