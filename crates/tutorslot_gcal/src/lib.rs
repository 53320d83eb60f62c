// Declare modules within this crate
pub mod auth;
pub mod service;

pub use auth::{create_calendar_hub, HubType};
pub use service::{GcalServiceError, GoogleCalendarService};
