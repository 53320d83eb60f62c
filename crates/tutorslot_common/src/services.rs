//! Service abstractions for the external calendar.
//!
//! The booking core never talks to a calendar provider directly. It calls into the
//! [`CalendarService`] trait defined here, which keeps provider transport and payload
//! shapes out of the state machine and lets tests swap in an in-memory calendar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A wrapper error type that implements std::error::Error for Box<dyn std::error::Error + Send + Sync>
#[derive(Debug)]
pub struct BoxedError(pub Box<dyn StdError + Send + Sync>);

impl fmt::Display for BoxedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for BoxedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<Box<dyn StdError + Send + Sync>> for BoxedError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        BoxedError(err)
    }
}

/// Operations the booking core needs from a calendar provider.
///
/// Every method is scoped by a calendar id. `update` and `delete` take a
/// `notify_attendees` flag which providers map onto their own invitation mechanism.
pub trait CalendarService: Send + Sync {
    /// Error type returned by calendar service operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch a single event.
    fn get(&self, calendar_id: &str, event_id: &str) -> BoxFuture<'_, CalendarRecord, Self::Error>;

    /// Overwrite an event's summary and attendee list.
    fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        mirror: MirrorUpdate,
        notify_attendees: bool,
    ) -> BoxFuture<'_, CalendarRecord, Self::Error>;

    /// List events matching the filter, ordered by start time ascending.
    fn list(
        &self,
        calendar_id: &str,
        filter: EventFilter,
    ) -> BoxFuture<'_, Vec<CalendarRecord>, Self::Error>;

    /// Remove an event from the calendar.
    fn delete(
        &self,
        calendar_id: &str,
        event_id: &str,
        notify_attendees: bool,
    ) -> BoxFuture<'_, (), Self::Error>;
}

/// Response of an attendee to an event invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    #[default]
    NeedsAction,
    Declined,
    Tentative,
    Accepted,
}

impl ResponseStatus {
    /// Parses the provider string, treating anything unknown as `NeedsAction`.
    pub fn from_provider(status: Option<&str>) -> Self {
        match status {
            Some("accepted") => ResponseStatus::Accepted,
            Some("declined") => ResponseStatus::Declined,
            Some("tentative") => ResponseStatus::Tentative,
            _ => ResponseStatus::NeedsAction,
        }
    }
}

/// An attendee as stored on the calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    #[serde(default)]
    pub response_status: ResponseStatus,
}

impl Attendee {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            response_status: ResponseStatus::NeedsAction,
        }
    }
}

/// Raw event record as returned by the calendar provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarRecord {
    /// The ID of the event.
    pub event_id: String,
    /// The summary or title of the event.
    pub summary: String,
    /// Provider status, e.g. "confirmed" or "cancelled".
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

impl CalendarRecord {
    pub fn is_cancelled(&self) -> bool {
        self.status == "cancelled"
    }
}

/// The denormalized view of a slot written to the calendar.
///
/// Writing a mirror also leaves the event confirmed, which restores a cancelled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorUpdate {
    pub summary: String,
    /// Attendee emails, in order.
    pub attendees: Vec<String>,
}

/// Selection of events for [`CalendarService::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Only events starting at or after this instant.
    pub time_min: Option<DateTime<Utc>>,
    /// Only events starting before this instant.
    pub time_max: Option<DateTime<Utc>>,
    /// Include events whose status is "cancelled".
    pub include_cancelled: bool,
}

impl EventFilter {
    /// True if an event starting at `start` falls inside the window.
    pub fn matches_start(&self, start: Option<DateTime<Utc>>) -> bool {
        let Some(start) = start else {
            return self.time_min.is_none() && self.time_max.is_none();
        };
        self.time_min.map_or(true, |min| start >= min) && self.time_max.map_or(true, |max| start < max)
    }
}

#[cfg(feature = "memory")]
pub mod memory;
