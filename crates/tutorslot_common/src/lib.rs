// --- File: crates/tutorslot_common/src/lib.rs ---

// Declare modules within this crate
pub mod error;     // Error handling
pub mod logging;   // Logging utilities
pub mod services;  // Calendar service abstraction

// Re-export error types and utilities for easier access
pub use error::{
    ExitStatus,
    TutorslotError,
    config_error,
    exit_code,
    external_service_error,
    usage_error,
};

// Re-export the calendar service surface
pub use services::{
    Attendee,
    BoxFuture,
    BoxedError,
    CalendarRecord,
    CalendarService,
    EventFilter,
    MirrorUpdate,
    ResponseStatus,
};
