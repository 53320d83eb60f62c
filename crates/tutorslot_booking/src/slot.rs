//! Slot model and its mapping to and from the calendar mirror.
//!
//! The calendar only ever sees a summary line and an attendee list. Both are derived
//! from a [`Slot`] by [`Slot::mirror`], and [`Slot::from_record`] reverses the mapping
//! when the registry is hydrated from the calendar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tutorslot_common::{Attendee, CalendarRecord, MirrorUpdate, ResponseStatus};

/// Summary of an unclaimed slot.
pub const AVAILABLE_SUMMARY: &str = "Available Slot";

/// Summary prefix of a claimed slot, followed by the student's email.
pub const TUTORING_PREFIX: &str = "Tutoring: ";

/// Opaque slot identifier; the calendar event id.
pub type SlotId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotState {
    Available,
    Requested,
    Staffed,
    Cancelled,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotState::Available => "Available",
            SlotState::Requested => "Requested",
            SlotState::Staffed => "Staffed",
            SlotState::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Tutor,
}

impl Role {
    /// The other party of a booking.
    pub fn counterparty(self) -> Role {
        match self {
            Role::Student => Role::Tutor,
            Role::Tutor => Role::Student,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => f.write_str("student"),
            Role::Tutor => f.write_str("tutor"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "tutor" | "volunteer" => Ok(Role::Tutor),
            other => Err(format!("unknown role '{}', expected student or tutor", other)),
        }
    }
}

/// Who is asking for a cancellation. The role is always stated, never guessed from the email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }

    pub fn student(email: impl Into<String>) -> Self {
        Self::new(email, Role::Student)
    }

    pub fn tutor(email: impl Into<String>) -> Self {
        Self::new(email, Role::Tutor)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.email, self.role)
    }
}

/// A bookable calendar time window.
///
/// `student_email` is set iff the state is Requested or Staffed; `tutor_email` only
/// in Staffed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub state: SlotState,
    pub student_email: Option<String>,
    pub tutor_email: Option<String>,
    pub student_accepted: bool,
    pub tutor_accepted: bool,
}

impl Slot {
    /// A fresh, unclaimed slot.
    pub fn available(
        id: impl Into<SlotId>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time,
            state: SlotState::Available,
            student_email: None,
            tutor_email: None,
            student_accepted: false,
            tutor_accepted: false,
        }
    }

    /// Summary and attendee list the calendar should show for this slot.
    pub fn mirror(&self) -> MirrorUpdate {
        match (self.state, &self.student_email, &self.tutor_email) {
            (SlotState::Requested, Some(student), _) => MirrorUpdate {
                summary: format!("{}{}", TUTORING_PREFIX, student),
                attendees: vec![student.clone()],
            },
            (SlotState::Staffed, Some(student), Some(tutor)) => MirrorUpdate {
                summary: format!("{}{}", TUTORING_PREFIX, student),
                attendees: vec![student.clone(), tutor.clone()],
            },
            // Available, Cancelled, and anything that would break the invariant
            _ => MirrorUpdate {
                summary: AVAILABLE_SUMMARY.to_string(),
                attendees: Vec::new(),
            },
        }
    }

    /// Rebuilds a slot from a calendar record.
    ///
    /// Returns `None` for records that are not bookable slots: any other summary, or a
    /// tutoring summary whose attendee list does not match it.
    pub fn from_record(record: &CalendarRecord) -> Option<Self> {
        let mut slot = Slot::available(record.event_id.clone(), record.start_time, record.end_time);

        if record.is_cancelled() {
            slot.state = SlotState::Cancelled;
            return Some(slot);
        }

        let summary = record.summary.trim();
        if summary == AVAILABLE_SUMMARY {
            return Some(slot);
        }

        let student = summary.strip_prefix(TUTORING_PREFIX)?.trim();
        match record.attendees.as_slice() {
            [first] if same_email(&first.email, student) => {
                slot.state = SlotState::Requested;
                slot.student_email = Some(first.email.clone());
            }
            [first, second] if same_email(&first.email, student) && !same_email(&second.email, student) => {
                slot.state = SlotState::Staffed;
                slot.student_email = Some(first.email.clone());
                slot.tutor_email = Some(second.email.clone());
            }
            _ => return None,
        }
        slot.apply_responses(&record.attendees);
        Some(slot)
    }

    /// Copies attendee responses onto the accepted flags of the matching parties.
    pub fn apply_responses(&mut self, attendees: &[Attendee]) {
        let accepted = |email: &Option<String>| {
            email.as_deref().is_some_and(|email| {
                attendees
                    .iter()
                    .any(|a| same_email(&a.email, email) && a.response_status == ResponseStatus::Accepted)
            })
        };
        self.student_accepted = accepted(&self.student_email);
        self.tutor_accepted = accepted(&self.tutor_email);
    }

    /// Email attached for the given role, if any.
    pub fn email_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Student => self.student_email.as_deref(),
            Role::Tutor => self.tutor_email.as_deref(),
        }
    }

    pub fn accepted_by(&self, role: Role) -> bool {
        match role {
            Role::Student => self.student_accepted,
            Role::Tutor => self.tutor_accepted,
        }
    }

    /// Back to Available with no parties and no acceptances.
    pub fn reset(&mut self) {
        self.state = SlotState::Available;
        self.student_email = None;
        self.tutor_email = None;
        self.student_accepted = false;
        self.tutor_accepted = false;
    }

    /// Checks the email invariant for the current state. A staffed slot has two distinct parties.
    pub fn is_consistent(&self) -> bool {
        match self.state {
            SlotState::Available | SlotState::Cancelled => {
                self.student_email.is_none() && self.tutor_email.is_none()
            }
            SlotState::Requested => self.student_email.is_some() && self.tutor_email.is_none(),
            SlotState::Staffed => match (&self.student_email, &self.tutor_email) {
                (Some(student), Some(tutor)) => !same_email(student, tutor),
                _ => false,
            },
        }
    }
}

/// Emails compare case-insensitively, ignoring surrounding whitespace.
pub fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Minimal shape check: one `@` with something on both sides and no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
