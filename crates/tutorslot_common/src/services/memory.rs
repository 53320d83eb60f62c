//! In-memory implementation of [`CalendarService`] for tests.
//!
//! Besides storing events it counts calls per operation and can be told to fail the
//! next calls of a given operation, which is how the rollback paths get exercised.

use super::{BoxFuture, CalendarRecord, CalendarService, EventFilter, MirrorUpdate, ResponseStatus};
use super::Attendee;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryCalendarError {
    #[error("Event not found: {0}")]
    NotFound(String),
    #[error("Injected failure in {0}")]
    Injected(Operation),
}

/// Calendar operations, used for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Update,
    List,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::List => "list",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
struct State {
    events: HashMap<String, Vec<CalendarRecord>>,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, usize>,
    notified: Vec<String>,
}

/// Calendar service keeping events in process memory.
#[derive(Default)]
pub struct MemoryCalendarService {
    state: Mutex<State>,
}

impl MemoryCalendarService {
    /// Create a new, empty calendar service.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds an "Available Slot" event and returns its id.
    pub fn add_open_slot(
        &self,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> String {
        let event_id = format!("mock-event-{}", uuid::Uuid::new_v4().simple());
        self.insert(
            calendar_id,
            CalendarRecord {
                event_id: event_id.clone(),
                summary: "Available Slot".to_string(),
                status: "confirmed".to_string(),
                start_time: Some(start_time),
                end_time: Some(end_time),
                attendees: Vec::new(),
            },
        );
        event_id
    }

    /// Inserts or replaces a raw record.
    pub fn insert(&self, calendar_id: &str, record: CalendarRecord) {
        let mut state = self.state();
        let events = state.events.entry(calendar_id.to_string()).or_default();
        events.retain(|existing| existing.event_id != record.event_id);
        events.push(record);
    }

    /// Returns the stored record without counting a call.
    pub fn record(&self, calendar_id: &str, event_id: &str) -> Option<CalendarRecord> {
        self.state()
            .events
            .get(calendar_id)
            .and_then(|events| events.iter().find(|e| e.event_id == event_id).cloned())
    }

    /// Sets an attendee's response, as if they answered the invitation.
    pub fn respond(&self, calendar_id: &str, event_id: &str, email: &str, status: ResponseStatus) -> bool {
        let mut state = self.state();
        let attendee = state
            .events
            .get_mut(calendar_id)
            .and_then(|events| events.iter_mut().find(|e| e.event_id == event_id))
            .and_then(|event| event.attendees.iter_mut().find(|a| a.email == email));
        match attendee {
            Some(attendee) => {
                attendee.response_status = status;
                true
            }
            None => false,
        }
    }

    /// Makes the next `times` calls of `operation` fail.
    pub fn fail_next(&self, operation: Operation, times: usize) {
        self.state().failures.insert(operation, times);
    }

    /// Number of calls made for `operation`, failed ones included.
    pub fn calls(&self, operation: Operation) -> usize {
        self.state().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Event ids for which attendees were notified, in call order.
    pub fn notified(&self) -> Vec<String> {
        self.state().notified.clone()
    }

    fn begin(state: &mut State, operation: Operation) -> Result<(), MemoryCalendarError> {
        *state.calls.entry(operation).or_insert(0) += 1;
        match state.failures.get_mut(&operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(MemoryCalendarError::Injected(operation))
            }
            _ => Ok(()),
        }
    }
}

impl CalendarService for MemoryCalendarService {
    type Error = MemoryCalendarError;

    fn get(&self, calendar_id: &str, event_id: &str) -> BoxFuture<'_, CalendarRecord, Self::Error> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();

        Box::pin(async move {
            let mut state = self.state();
            Self::begin(&mut state, Operation::Get)?;
            state
                .events
                .get(&calendar_id)
                .and_then(|events| events.iter().find(|e| e.event_id == event_id).cloned())
                .ok_or(MemoryCalendarError::NotFound(event_id))
        })
    }

    fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        mirror: MirrorUpdate,
        notify_attendees: bool,
    ) -> BoxFuture<'_, CalendarRecord, Self::Error> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();

        Box::pin(async move {
            let mut state = self.state();
            Self::begin(&mut state, Operation::Update)?;
            let event = state
                .events
                .get_mut(&calendar_id)
                .and_then(|events| events.iter_mut().find(|e| e.event_id == event_id))
                .ok_or_else(|| MemoryCalendarError::NotFound(event_id.clone()))?;

            // Keep responses of attendees who stay on the event.
            let previous = std::mem::take(&mut event.attendees);
            event.attendees = mirror
                .attendees
                .into_iter()
                .map(|email| {
                    previous
                        .iter()
                        .find(|a| a.email == email)
                        .cloned()
                        .unwrap_or_else(|| Attendee::new(email))
                })
                .collect();
            event.summary = mirror.summary;
            event.status = "confirmed".to_string();
            let updated = event.clone();

            if notify_attendees {
                state.notified.push(event_id);
            }
            Ok(updated)
        })
    }

    fn list(
        &self,
        calendar_id: &str,
        filter: EventFilter,
    ) -> BoxFuture<'_, Vec<CalendarRecord>, Self::Error> {
        let calendar_id = calendar_id.to_string();

        Box::pin(async move {
            let mut state = self.state();
            Self::begin(&mut state, Operation::List)?;
            let mut records: Vec<CalendarRecord> = state
                .events
                .get(&calendar_id)
                .map(|events| {
                    events
                        .iter()
                        .filter(|e| filter.include_cancelled || !e.is_cancelled())
                        .filter(|e| filter.matches_start(e.start_time))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            records.sort_by_key(|r| r.start_time);
            Ok(records)
        })
    }

    fn delete(
        &self,
        calendar_id: &str,
        event_id: &str,
        notify_attendees: bool,
    ) -> BoxFuture<'_, (), Self::Error> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();

        Box::pin(async move {
            let mut state = self.state();
            Self::begin(&mut state, Operation::Delete)?;
            if let Some(events) = state.events.get_mut(&calendar_id) {
                events.retain(|e| e.event_id != event_id);
            }
            if notify_attendees {
                state.notified.push(event_id);
            }
            Ok(())
        })
    }
}
