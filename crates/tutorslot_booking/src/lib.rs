// Declare modules within this crate
pub mod error;
pub mod registry;
#[cfg(test)]
mod registry_proptest;
#[cfg(test)]
mod registry_test;
pub mod slot;

pub use error::BookingError;
pub use registry::{AvailableSlots, SlotRegistry};
pub use slot::{Actor, Role, Slot, SlotId, SlotState, AVAILABLE_SUMMARY, TUTORING_PREFIX};
