//! The slot registry: authoritative slot state and its transitions.
//!
//! Every transition on a slot runs under that slot's own async mutex, held from the
//! first read until the calendar has acknowledged the new mirror (or the local change
//! has been rolled back). Slots never lock each other.
//!
//! The contract with the calendar is at-most-once commit with best-effort
//! compensation: the new state is committed locally, then written to the calendar;
//! if that write fails the previous state is restored and the failure is returned.
//! Nothing here makes the two sides atomic.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};
use tutorslot_common::{CalendarService, EventFilter};
use tutorslot_config::CalendarConfig;

use crate::error::BookingError;
use crate::slot::{is_valid_email, same_email, Actor, Slot, SlotId, SlotState};

type SlotCell = Arc<Mutex<Slot>>;

/// Owns every tracked slot and serializes transitions per slot id.
pub struct SlotRegistry<S: CalendarService> {
    config: CalendarConfig,
    service: Arc<S>,
    slots: DashMap<SlotId, SlotCell>,
}

/// Snapshot of the slots that were Available when it was taken, ordered by start time.
///
/// Iterating does not touch the registry, and can be repeated.
#[derive(Debug, Clone, Default)]
pub struct AvailableSlots {
    slots: Vec<Slot>,
}

impl AvailableSlots {
    pub fn iter(&self) -> std::slice::Iter<'_, Slot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl IntoIterator for AvailableSlots {
    type Item = Slot;
    type IntoIter = std::vec::IntoIter<Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

impl<'a> IntoIterator for &'a AvailableSlots {
    type Item = &'a Slot;
    type IntoIter = std::slice::Iter<'a, Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

impl<S: CalendarService> SlotRegistry<S> {
    /// Create an empty registry bound to one calendar.
    pub fn new(config: CalendarConfig, service: Arc<S>) -> Self {
        Self {
            config,
            service,
            slots: DashMap::new(),
        }
    }

    pub fn calendar_id(&self) -> &str {
        &self.config.calendar_id
    }

    /// Number of tracked slots, whatever their state.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Starts tracking a slot, replacing any slot with the same id.
    pub async fn track(&self, slot: Slot) {
        let existing = self.slots.get(&slot.id).map(|entry| Arc::clone(entry.value()));
        match existing {
            Some(cell) => *cell.lock().await = slot,
            None => {
                self.slots.insert(slot.id.clone(), Arc::new(Mutex::new(slot)));
            }
        }
    }

    /// Hydrates the registry from the calendar.
    ///
    /// Loads upcoming events (bounded by `lookahead_days` when set), including cancelled
    /// ones, and rebuilds a slot from each bookable record. Slots no longer on the
    /// calendar are dropped. Returns the number of tracked slots.
    pub async fn load(&self) -> Result<usize, BookingError> {
        let now = Utc::now();
        let time_max = match self.config.lookahead_days {
            Some(days) => Some(
                Duration::try_days(days)
                    .filter(|window| *window > Duration::zero())
                    .and_then(|window| now.checked_add_signed(window))
                    .ok_or(BookingError::InvalidLookahead { days })?,
            ),
            None => None,
        };
        let filter = EventFilter {
            time_min: Some(now),
            time_max,
            include_cancelled: true,
        };

        let records = self
            .service
            .list(self.calendar_id(), filter)
            .await
            .map_err(|e| BookingError::remote("list", self.calendar_id(), e))?;

        let mut seen = Vec::with_capacity(records.len());
        for record in &records {
            match Slot::from_record(record) {
                Some(slot) => {
                    seen.push(slot.id.clone());
                    self.track(slot).await;
                }
                None => debug!(
                    "Skipping event {} ('{}'): not a tutoring slot",
                    record.event_id, record.summary
                ),
            }
        }
        self.slots.retain(|id, _| seen.contains(id));

        info!(
            "Loaded {} slots from calendar {} ({} events)",
            self.slots.len(),
            self.calendar_id(),
            records.len()
        );
        Ok(self.slots.len())
    }

    fn cell(&self, slot_id: &str) -> Result<SlotCell, BookingError> {
        // Clone the Arc so the map shard is unlocked before awaiting the slot mutex.
        self.slots
            .get(slot_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BookingError::not_found(slot_id))
    }

    /// Locks a slot for a transition.
    ///
    /// A delete or reload may stop tracking the slot while we wait; the caller then sees
    /// `NotFound`, as if it had arrived afterwards.
    async fn lock(&self, slot_id: &str) -> Result<OwnedMutexGuard<Slot>, BookingError> {
        let cell = self.cell(slot_id)?;
        let slot = Arc::clone(&cell).lock_owned().await;
        let still_tracked = self
            .slots
            .get(slot_id)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), &cell));
        if !still_tracked {
            return Err(BookingError::not_found(slot_id));
        }
        Ok(slot)
    }

    /// Current state of one slot.
    pub async fn get(&self, slot_id: &str) -> Result<Slot, BookingError> {
        let slot = self.lock(slot_id).await?;
        Ok(slot.clone())
    }

    /// Slots currently Available, by start time ascending. Slots without a start come last.
    ///
    /// The result is an eager snapshot rather than a lazy view: each slot is read once
    /// under its lock, so the sequence is finite, restartable, and never reflects a
    /// transition that completes while it is being iterated.
    pub async fn list_available(&self) -> AvailableSlots {
        let cells: Vec<SlotCell> = self.slots.iter().map(|entry| Arc::clone(entry.value())).collect();

        let mut slots = Vec::new();
        for cell in cells {
            let slot = cell.lock().await;
            if slot.state == SlotState::Available {
                slots.push(slot.clone());
            }
        }
        slots.sort_by(|a, b| {
            (a.start_time.is_none(), a.start_time, &a.id).cmp(&(b.start_time.is_none(), b.start_time, &b.id))
        });
        AvailableSlots { slots }
    }

    /// A student claims an Available slot.
    pub async fn book(&self, slot_id: &str, student_email: &str) -> Result<Slot, BookingError> {
        let student_email = checked_email(student_email)?;
        let mut slot = self.lock(slot_id).await?;

        if slot.state != SlotState::Available {
            warn!("Rejected booking of slot {} by {}: slot is {}", slot_id, student_email, slot.state);
            return Err(BookingError::invalid_state(slot_id, "book", slot.state));
        }

        let mut next = slot.clone();
        next.state = SlotState::Requested;
        next.student_email = Some(student_email.clone());
        next.student_accepted = false;
        next.tutor_accepted = false;

        let committed = self.commit(&mut slot, next, "book").await?;
        info!("Slot {} booked by student {}", slot_id, student_email);
        Ok(committed)
    }

    /// A tutor joins a slot a student has already requested.
    pub async fn volunteer(&self, slot_id: &str, tutor_email: &str) -> Result<Slot, BookingError> {
        let tutor_email = checked_email(tutor_email)?;
        let mut slot = self.lock(slot_id).await?;

        if slot.state != SlotState::Requested {
            warn!("Rejected volunteer for slot {} by {}: slot is {}", slot_id, tutor_email, slot.state);
            return Err(BookingError::invalid_state(slot_id, "volunteer", slot.state));
        }
        // The calendar keeps one attendee per address, so the mirror could not tell them apart.
        if slot
            .student_email
            .as_deref()
            .is_some_and(|student| same_email(student, &tutor_email))
        {
            warn!("Rejected volunteer for slot {}: {} is already its student", slot_id, tutor_email);
            return Err(BookingError::SameParty {
                slot_id: slot_id.to_string(),
                email: tutor_email,
            });
        }

        let mut next = slot.clone();
        next.state = SlotState::Staffed;
        next.tutor_email = Some(tutor_email.clone());
        next.tutor_accepted = false;

        let committed = self.commit(&mut slot, next, "volunteer").await?;
        info!("Tutor {} volunteered for slot {}", tutor_email, slot_id);
        Ok(committed)
    }

    /// Resets a slot to Available without looking at acceptances.
    ///
    /// This is the unguarded cancel: any caller can erase a booking the other party has
    /// already accepted. Use [`SlotRegistry::cancel_if_unaccepted`] unless that is the
    /// intent. It works from every state; a slot whose event was cancelled on the
    /// calendar is reopened. The actor, if given, is only logged.
    pub async fn cancel(&self, slot_id: &str, actor: Option<&Actor>) -> Result<Slot, BookingError> {
        let mut slot = self.lock(slot_id).await?;

        let previous_state = slot.state;
        let mut next = slot.clone();
        next.reset();

        let committed = self.commit(&mut slot, next, "cancel").await?;
        match actor {
            Some(actor) => info!("Slot {} cancelled by {} (was {})", slot_id, actor, previous_state),
            None => info!("Slot {} cancelled (was {})", slot_id, previous_state),
        }
        Ok(committed)
    }

    /// Cancels only if the counterparty of `actor` has not accepted.
    ///
    /// Acceptances are re-read from the calendar first. The actor must be the attendee
    /// recorded for their stated role. On rejection the slot is left exactly as it was.
    pub async fn cancel_if_unaccepted(&self, slot_id: &str, actor: &Actor) -> Result<Slot, BookingError> {
        let mut slot = self.lock(slot_id).await?;

        if !matches!(slot.state, SlotState::Requested | SlotState::Staffed) {
            return Err(BookingError::invalid_state(slot_id, "cancel", slot.state));
        }

        let is_recorded_party = slot
            .email_for(actor.role)
            .is_some_and(|email| same_email(email, &actor.email));
        if !is_recorded_party {
            warn!("Rejected cancel of slot {}: {} is not on the booking", slot_id, actor);
            return Err(BookingError::ActorMismatch {
                slot_id: slot_id.to_string(),
                email: actor.email.clone(),
                role: actor.role,
            });
        }

        self.sync_responses(&mut slot).await?;

        let counterparty = actor.role.counterparty();
        if slot.accepted_by(counterparty) {
            let email = slot.email_for(counterparty).unwrap_or_default().to_string();
            warn!(
                "Cancellation of slot {} blocked: {} {} has already accepted",
                slot_id, counterparty, email
            );
            return Err(BookingError::CounterpartyAccepted {
                slot_id: slot_id.to_string(),
                counterparty,
                email,
            });
        }

        let mut next = slot.clone();
        next.reset();
        let committed = self.commit(&mut slot, next, "cancel").await?;
        info!("Slot {} cancelled by {}, no counterparty acceptance", slot_id, actor);
        Ok(committed)
    }

    /// Re-reads attendee responses from the calendar and updates the accepted flags.
    ///
    /// State and emails stay as the registry has them.
    pub async fn refresh(&self, slot_id: &str) -> Result<Slot, BookingError> {
        let mut slot = self.lock(slot_id).await?;
        self.sync_responses(&mut slot).await?;
        Ok(slot.clone())
    }

    /// Removes the slot from the calendar, then stops tracking it.
    ///
    /// The slot stays tracked and locked while the calendar call runs; callers queued
    /// behind it find it gone (`NotFound`) only once the delete has succeeded.
    pub async fn delete(&self, slot_id: &str) -> Result<Slot, BookingError> {
        let slot = self.lock(slot_id).await?;

        if let Err(e) = self
            .service
            .delete(self.calendar_id(), slot_id, self.config.notify_attendees)
            .await
        {
            error!("Deleting slot {} failed, keeping it: {}", slot_id, e);
            return Err(BookingError::remote("delete", slot_id, e));
        }

        // Only drop our own cell; a reload may have replaced it meanwhile.
        let cell = OwnedMutexGuard::mutex(&slot);
        self.slots.remove_if(slot_id, |_, tracked| Arc::ptr_eq(tracked, cell));
        let removed = slot.clone();
        info!("Slot {} deleted", slot_id);
        Ok(removed)
    }

    async fn sync_responses(&self, slot: &mut OwnedMutexGuard<Slot>) -> Result<(), BookingError> {
        let record = self
            .service
            .get(self.calendar_id(), &slot.id)
            .await
            .map_err(|e| BookingError::remote("get", &slot.id, e))?;
        slot.apply_responses(&record.attendees);
        debug!(
            "Slot {} responses: student_accepted={} tutor_accepted={}",
            slot.id, slot.student_accepted, slot.tutor_accepted
        );
        Ok(())
    }

    /// Commits `next` locally, then mirrors it to the calendar; restores the previous
    /// state if the calendar write fails. Exactly one update call per commit.
    async fn commit(
        &self,
        slot: &mut OwnedMutexGuard<Slot>,
        next: Slot,
        operation: &'static str,
    ) -> Result<Slot, BookingError> {
        debug_assert!(next.is_consistent(), "transition produced an inconsistent slot");
        let previous = std::mem::replace(&mut **slot, next);
        let mirror = slot.mirror();

        match self
            .service
            .update(self.calendar_id(), &slot.id, mirror, self.config.notify_attendees)
            .await
        {
            Ok(_) => Ok((**slot).clone()),
            Err(e) => {
                error!("Calendar update for {} on slot {} failed, rolling back: {}", operation, slot.id, e);
                let failed_id = slot.id.clone();
                **slot = previous;
                Err(BookingError::remote("update", &failed_id, e))
            }
        }
    }
}

fn checked_email(email: &str) -> Result<String, BookingError> {
    let email = email.trim();
    if is_valid_email(email) {
        Ok(email.to_string())
    } else {
        Err(BookingError::InvalidEmail(email.to_string()))
    }
}
