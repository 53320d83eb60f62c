//! Google Calendar service implementation.
//!
//! This module provides an implementation of the CalendarService trait for Google Calendar.

use chrono::{DateTime, NaiveDate, Utc};
use google_calendar3::api::{Event, EventAttendee, EventDateTime};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use tutorslot_common::{
    Attendee, BoxFuture, CalendarRecord, CalendarService, EventFilter, MirrorUpdate, ResponseStatus,
};

use crate::auth::HubType;

/// Errors that can occur when interacting with Google Calendar.
#[derive(Error, Debug)]
pub enum GcalServiceError {
    #[error("Google API Error: {0}")]
    ApiError(#[from] google_calendar3::Error),
    #[error("Event not found: {0}")]
    NotFound(String),
    #[error("Event is missing field: {0}")]
    MissingField(&'static str),
}

impl GcalServiceError {
    fn from_api(err: google_calendar3::Error, event_id: &str) -> Self {
        // The client only exposes the status through the rendered error.
        if err.to_string().contains("404") {
            GcalServiceError::NotFound(event_id.to_string())
        } else {
            GcalServiceError::ApiError(err)
        }
    }
}

/// Google Calendar service implementation.
pub struct GoogleCalendarService {
    calendar_hub: Arc<HubType>,
}

impl GoogleCalendarService {
    /// Create a new Google Calendar service.
    pub fn new(calendar_hub: Arc<HubType>) -> Self {
        Self { calendar_hub }
    }
}

fn send_updates(notify_attendees: bool) -> &'static str {
    if notify_attendees {
        "all"
    } else {
        "none"
    }
}

/// Start or end of an event as a UTC instant. All-day events start at midnight UTC.
fn event_instant(when: Option<&EventDateTime>) -> Option<DateTime<Utc>> {
    let when = when?;
    when.date_time.or_else(|| {
        when.date
            .and_then(|d: NaiveDate| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Converts a Google event into the provider-neutral record.
pub fn record_from_event(event: Event) -> Result<CalendarRecord, GcalServiceError> {
    let event_id = event.id.ok_or(GcalServiceError::MissingField("id"))?;
    let start_time = event_instant(event.start.as_ref());
    let end_time = event_instant(event.end.as_ref());

    let attendees = event
        .attendees
        .unwrap_or_default()
        .into_iter()
        .filter_map(|attendee| {
            let email = attendee.email?;
            Some(Attendee {
                email,
                response_status: ResponseStatus::from_provider(attendee.response_status.as_deref()),
            })
        })
        .collect();

    Ok(CalendarRecord {
        event_id,
        summary: event.summary.unwrap_or_default(),
        status: event.status.unwrap_or_else(|| "confirmed".to_string()),
        start_time,
        end_time,
        attendees,
    })
}

/// Writes the mirror onto an event, keeping the responses of attendees who stay.
///
/// The event is (re)confirmed, so a slot cancelled on the calendar comes back.
pub fn apply_mirror(event: &mut Event, mirror: MirrorUpdate) {
    let previous = event.attendees.take().unwrap_or_default();
    let attendees = mirror
        .attendees
        .into_iter()
        .map(|email| {
            previous
                .iter()
                .find(|a| a.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(&email)))
                .cloned()
                .unwrap_or_else(|| EventAttendee {
                    email: Some(email),
                    ..Default::default()
                })
        })
        .collect();
    event.summary = Some(mirror.summary);
    event.status = Some("confirmed".to_string());
    event.attendees = Some(attendees);
}

impl CalendarService for GoogleCalendarService {
    type Error = GcalServiceError;

    fn get(&self, calendar_id: &str, event_id: &str) -> BoxFuture<'_, CalendarRecord, Self::Error> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            let (_response, event) = calendar_hub
                .events()
                .get(&calendar_id, &event_id)
                .doit()
                .await
                .map_err(|e| GcalServiceError::from_api(e, &event_id))?;
            record_from_event(event)
        })
    }

    /// Reads the event, replaces summary and attendees, and writes it back.
    ///
    /// With `notify_attendees` Google emails an invitation or update to every attendee,
    /// which is how students and tutors see the slot on their own calendars.
    fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        mirror: MirrorUpdate,
        notify_attendees: bool,
    ) -> BoxFuture<'_, CalendarRecord, Self::Error> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            let (_response, mut event) = calendar_hub
                .events()
                .get(&calendar_id, &event_id)
                .doit()
                .await
                .map_err(|e| GcalServiceError::from_api(e, &event_id))?;

            apply_mirror(&mut event, mirror);

            let (_response, updated) = calendar_hub
                .events()
                .update(event, &calendar_id, &event_id)
                .send_updates(send_updates(notify_attendees))
                .doit()
                .await
                .map_err(|e| GcalServiceError::from_api(e, &event_id))?;

            debug!("Updated event {}: {:?}", event_id, updated.html_link);
            record_from_event(updated)
        })
    }

    /// Lists single (expanded) events ordered by start time, following every result page.
    fn list(
        &self,
        calendar_id: &str,
        filter: EventFilter,
    ) -> BoxFuture<'_, Vec<CalendarRecord>, Self::Error> {
        let calendar_id = calendar_id.to_string();
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            let mut records = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let mut request = calendar_hub
                    .events()
                    .list(&calendar_id)
                    .single_events(true) // Expand recurring events
                    .order_by("startTime")
                    .show_deleted(filter.include_cancelled);
                if let Some(time_min) = filter.time_min {
                    request = request.time_min(time_min);
                }
                if let Some(time_max) = filter.time_max {
                    request = request.time_max(time_max);
                }
                if let Some(token) = page_token.as_deref() {
                    request = request.page_token(token);
                }

                let (_response, events) = request.doit().await?;

                for event in events.items.unwrap_or_default() {
                    match record_from_event(event) {
                        Ok(record) => records.push(record),
                        Err(e) => warn!("Skipping event in {}: {}", calendar_id, e),
                    }
                }

                page_token = events.next_page_token;
                if page_token.is_none() {
                    break;
                }
            }

            if !filter.include_cancelled {
                records.retain(|r| !r.is_cancelled());
            }
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
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            calendar_hub
                .events()
                .delete(&calendar_id, &event_id)
                .send_updates(send_updates(notify_attendees))
                .doit()
                .await
                .map_err(|e| GcalServiceError::from_api(e, &event_id))?;
            Ok(())
        })
    }
}
