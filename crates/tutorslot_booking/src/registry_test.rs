#[cfg(test)]
mod tests {
    use crate::{Actor, BookingError, Slot, SlotRegistry, SlotState};
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use tutorslot_common::services::memory::{MemoryCalendarService, Operation};
    use tutorslot_common::{Attendee, CalendarRecord, ResponseStatus};
    use tutorslot_config::CalendarConfig;

    const CALENDAR: &str = "org-calendar";

    struct Setup {
        calendar: Arc<MemoryCalendarService>,
        registry: SlotRegistry<MemoryCalendarService>,
        slot_id: String,
    }

    async fn setup() -> Setup {
        let calendar = Arc::new(MemoryCalendarService::new());
        let start = Utc::now() + Duration::hours(2);
        let slot_id = calendar.add_open_slot(CALENDAR, start, start + Duration::hours(1));
        let registry = SlotRegistry::new(CalendarConfig::new(CALENDAR), calendar.clone());
        registry.load().await.expect("load from memory calendar");
        Setup {
            calendar,
            registry,
            slot_id,
        }
    }

    async fn staffed_setup() -> Setup {
        let s = setup().await;
        s.registry.book(&s.slot_id, "student@x.com").await.unwrap();
        s.registry.volunteer(&s.slot_id, "tutor@x.com").await.unwrap();
        s
    }

    #[tokio::test]
    async fn test_book_moves_to_requested_and_mirrors_once() {
        let s = setup().await;

        let slot = s.registry.book(&s.slot_id, "student@x.com").await.unwrap();

        assert_eq!(slot.state, SlotState::Requested);
        assert_eq!(slot.student_email.as_deref(), Some("student@x.com"));
        assert_eq!(s.calendar.calls(Operation::Update), 1);
        let record = s.calendar.record(CALENDAR, &s.slot_id).unwrap();
        assert_eq!(record.summary, "Tutoring: student@x.com");
        assert_eq!(record.attendees, vec![Attendee::new("student@x.com")]);
        assert_eq!(s.calendar.notified(), vec![s.slot_id.clone()]);
    }

    #[tokio::test]
    async fn test_book_unknown_slot_is_not_found() {
        let s = setup().await;
        let err = s.registry.book("nope", "student@x.com").await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound { ref slot_id } if slot_id == "nope"));
        assert_eq!(s.calendar.calls(Operation::Update), 0);
    }

    #[tokio::test]
    async fn test_book_twice_reports_current_state() {
        let s = setup().await;
        s.registry.book(&s.slot_id, "first@x.com").await.unwrap();

        let err = s.registry.book(&s.slot_id, "second@x.com").await.unwrap_err();
        match err {
            BookingError::InvalidState { current, operation, .. } => {
                assert_eq!(current, SlotState::Requested);
                assert_eq!(operation, "book");
            }
            other => panic!("Expected InvalidState, got {:?}", other),
        }
        assert_eq!(s.calendar.calls(Operation::Update), 1);
        let slot = s.registry.get(&s.slot_id).await.unwrap();
        assert_eq!(slot.student_email.as_deref(), Some("first@x.com"));
    }

    #[tokio::test]
    async fn test_book_rejects_malformed_email() {
        let s = setup().await;
        let err = s.registry.book(&s.slot_id, "not-an-email").await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidEmail(_)));
        assert_eq!(s.registry.get(&s.slot_id).await.unwrap().state, SlotState::Available);
    }

    #[tokio::test]
    async fn test_volunteer_requires_a_student() {
        let s = setup().await;
        let err = s.registry.volunteer(&s.slot_id, "tutor@x.com").await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidState {
                current: SlotState::Available,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_second_volunteer_is_rejected() {
        let s = staffed_setup().await;
        let err = s.registry.volunteer(&s.slot_id, "other@x.com").await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidState {
                current: SlotState::Staffed,
                ..
            }
        ));
        let slot = s.registry.get(&s.slot_id).await.unwrap();
        assert_eq!(slot.tutor_email.as_deref(), Some("tutor@x.com"));
    }

    #[tokio::test]
    async fn test_cancel_resets_staffed_slot() {
        let s = staffed_setup().await;

        let slot = s.registry.cancel(&s.slot_id, None).await.unwrap();

        assert_eq!(slot.state, SlotState::Available);
        assert_eq!(slot.student_email, None);
        assert_eq!(slot.tutor_email, None);
        let record = s.calendar.record(CALENDAR, &s.slot_id).unwrap();
        assert_eq!(record.summary, "Available Slot");
        assert!(record.attendees.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_ignores_acceptance() {
        let s = staffed_setup().await;
        s.calendar
            .respond(CALENDAR, &s.slot_id, "tutor@x.com", ResponseStatus::Accepted);
        s.registry.refresh(&s.slot_id).await.unwrap();

        let slot = s
            .registry
            .cancel(&s.slot_id, Some(&Actor::student("student@x.com")))
            .await
            .unwrap();
        assert_eq!(slot.state, SlotState::Available);
        assert!(!slot.tutor_accepted);
    }

    #[tokio::test]
    async fn test_cancel_on_available_slot_still_mirrors() {
        let s = setup().await;
        let before = s.registry.get(&s.slot_id).await.unwrap();
        let after = s.registry.cancel(&s.slot_id, None).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(s.calendar.calls(Operation::Update), 1);
    }

    #[tokio::test]
    async fn test_guarded_cancel_rejected_when_tutor_accepted() {
        let s = staffed_setup().await;
        // Acceptance happens on the calendar after the registry was loaded.
        assert!(s
            .calendar
            .respond(CALENDAR, &s.slot_id, "tutor@x.com", ResponseStatus::Accepted));
        let before = s.registry.refresh(&s.slot_id).await.unwrap();
        let updates_before = s.calendar.calls(Operation::Update);

        let err = s
            .registry
            .cancel_if_unaccepted(&s.slot_id, &Actor::student("student@x.com"))
            .await
            .unwrap_err();

        match err {
            BookingError::CounterpartyAccepted { counterparty, email, .. } => {
                assert_eq!(counterparty, crate::Role::Tutor);
                assert_eq!(email, "tutor@x.com");
            }
            other => panic!("Expected CounterpartyAccepted, got {:?}", other),
        }
        assert_eq!(s.registry.get(&s.slot_id).await.unwrap(), before);
        assert_eq!(s.calendar.calls(Operation::Update), updates_before);
    }

    #[tokio::test]
    async fn test_guarded_cancel_reads_fresh_acceptance() {
        let s = staffed_setup().await;
        s.calendar
            .respond(CALENDAR, &s.slot_id, "student@x.com", ResponseStatus::Accepted);

        // No refresh: the guard must fetch the response itself.
        let err = s
            .registry
            .cancel_if_unaccepted(&s.slot_id, &Actor::tutor("tutor@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::CounterpartyAccepted { .. }));
    }

    #[tokio::test]
    async fn test_guarded_cancel_allowed_when_counterparty_pending() {
        let s = staffed_setup().await;
        // The actor's own acceptance does not block them.
        s.calendar
            .respond(CALENDAR, &s.slot_id, "student@x.com", ResponseStatus::Accepted);
        s.calendar
            .respond(CALENDAR, &s.slot_id, "tutor@x.com", ResponseStatus::Tentative);

        let slot = s
            .registry
            .cancel_if_unaccepted(&s.slot_id, &Actor::student("Student@X.com"))
            .await
            .unwrap();
        assert_eq!(slot.state, SlotState::Available);
        assert!(!slot.student_accepted);
    }

    #[tokio::test]
    async fn test_guarded_cancel_requires_recorded_party() {
        let s = staffed_setup().await;

        // Right email, wrong role.
        let err = s
            .registry
            .cancel_if_unaccepted(&s.slot_id, &Actor::tutor("student@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ActorMismatch { .. }));

        // Stranger.
        let err = s
            .registry
            .cancel_if_unaccepted(&s.slot_id, &Actor::student("mallory@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ActorMismatch { .. }));
        assert_eq!(s.registry.get(&s.slot_id).await.unwrap().state, SlotState::Staffed);
    }

    #[tokio::test]
    async fn test_guarded_cancel_by_student_on_requested_slot() {
        let s = setup().await;
        s.registry.book(&s.slot_id, "student@x.com").await.unwrap();
        let slot = s
            .registry
            .cancel_if_unaccepted(&s.slot_id, &Actor::student("student@x.com"))
            .await
            .unwrap();
        assert_eq!(slot.state, SlotState::Available);
    }

    #[tokio::test]
    async fn test_guarded_cancel_on_available_slot_is_invalid() {
        let s = setup().await;
        let err = s
            .registry
            .cancel_if_unaccepted(&s.slot_id, &Actor::student("student@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidState {
                current: SlotState::Available,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_update_failure_rolls_back_book() {
        let s = setup().await;
        s.calendar.fail_next(Operation::Update, 1);

        let err = s.registry.book(&s.slot_id, "student@x.com").await.unwrap_err();

        assert!(matches!(err, BookingError::RemoteService { operation: "update", .. }));
        let slot = s.registry.get(&s.slot_id).await.unwrap();
        assert_eq!(slot.state, SlotState::Available);
        assert_eq!(slot.student_email, None);
        assert_eq!(
            s.calendar.record(CALENDAR, &s.slot_id).unwrap().summary,
            "Available Slot"
        );

        // The slot is usable again once the calendar recovers.
        s.registry.book(&s.slot_id, "student@x.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_failure_rolls_back_cancel() {
        let s = staffed_setup().await;
        let before = s.registry.get(&s.slot_id).await.unwrap();
        s.calendar.fail_next(Operation::Update, 1);

        let err = s.registry.cancel(&s.slot_id, None).await.unwrap_err();

        assert!(matches!(err, BookingError::RemoteService { .. }));
        assert_eq!(s.registry.get(&s.slot_id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_guarded_cancel_surfaces_lookup_failure() {
        let s = staffed_setup().await;
        s.calendar.fail_next(Operation::Get, 1);

        let err = s
            .registry
            .cancel_if_unaccepted(&s.slot_id, &Actor::student("student@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::RemoteService { operation: "get", .. }));
        assert_eq!(s.registry.get(&s.slot_id).await.unwrap().state, SlotState::Staffed);
    }

    #[tokio::test]
    async fn test_delete_removes_slot() {
        let s = setup().await;
        let removed = s.registry.delete(&s.slot_id).await.unwrap();
        assert_eq!(removed.id, s.slot_id);
        assert!(s.calendar.record(CALENDAR, &s.slot_id).is_none());
        assert!(matches!(
            s.registry.get(&s.slot_id).await,
            Err(BookingError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_slot() {
        let s = staffed_setup().await;
        s.calendar.fail_next(Operation::Delete, 1);

        let err = s.registry.delete(&s.slot_id).await.unwrap_err();
        assert!(matches!(err, BookingError::RemoteService { operation: "delete", .. }));
        assert_eq!(s.registry.get(&s.slot_id).await.unwrap().state, SlotState::Staffed);
    }

    #[tokio::test]
    async fn test_list_available_is_ordered_and_restartable() {
        let calendar = Arc::new(MemoryCalendarService::new());
        let base = Utc::now() + Duration::hours(1);
        let late = calendar.add_open_slot(CALENDAR, base + Duration::hours(5), base + Duration::hours(6));
        let early = calendar.add_open_slot(CALENDAR, base, base + Duration::hours(1));
        let middle = calendar.add_open_slot(CALENDAR, base + Duration::hours(2), base + Duration::hours(3));
        let registry = SlotRegistry::new(CalendarConfig::new(CALENDAR), calendar.clone());
        registry.load().await.unwrap();
        registry.book(&middle, "student@x.com").await.unwrap();

        let available = registry.list_available().await;

        let first_pass: Vec<&str> = available.iter().map(|s| s.id.as_str()).collect();
        let second_pass: Vec<&str> = (&available).into_iter().map(|s| s.id.as_str()).collect();
        assert_eq!(first_pass, vec![early.as_str(), late.as_str()]);
        assert_eq!(first_pass, second_pass);
        assert_eq!(calendar.calls(Operation::Update), 1);
    }

    #[tokio::test]
    async fn test_load_tracks_claimed_and_cancelled_events() {
        let calendar = Arc::new(MemoryCalendarService::new());
        let start = Utc::now() + Duration::hours(3);
        calendar.insert(
            CALENDAR,
            CalendarRecord {
                event_id: "claimed".to_string(),
                summary: "Tutoring: student@x.com".to_string(),
                status: "confirmed".to_string(),
                start_time: Some(start),
                end_time: Some(start + Duration::hours(1)),
                attendees: vec![Attendee::new("student@x.com")],
            },
        );
        calendar.insert(
            CALENDAR,
            CalendarRecord {
                event_id: "gone".to_string(),
                summary: "Available Slot".to_string(),
                status: "cancelled".to_string(),
                start_time: Some(start),
                end_time: Some(start + Duration::hours(1)),
                attendees: vec![],
            },
        );
        calendar.insert(
            CALENDAR,
            CalendarRecord {
                event_id: "standup".to_string(),
                summary: "Staff standup".to_string(),
                status: "confirmed".to_string(),
                start_time: Some(start),
                end_time: Some(start + Duration::hours(1)),
                attendees: vec![],
            },
        );
        let registry = SlotRegistry::new(CalendarConfig::new(CALENDAR), calendar.clone());

        assert_eq!(registry.load().await.unwrap(), 2);

        assert_eq!(registry.get("claimed").await.unwrap().state, SlotState::Requested);
        assert!(registry.list_available().await.is_empty());
        assert!(matches!(
            registry.book("gone", "student@x.com").await,
            Err(BookingError::InvalidState {
                current: SlotState::Cancelled,
                ..
            })
        ));
        assert!(matches!(
            registry.get("standup").await,
            Err(BookingError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_reopens_cancelled_event() {
        let calendar = Arc::new(MemoryCalendarService::new());
        let start = Utc::now() + Duration::hours(3);
        calendar.insert(
            CALENDAR,
            CalendarRecord {
                event_id: "gone".to_string(),
                summary: "Tutoring: student@x.com".to_string(),
                status: "cancelled".to_string(),
                start_time: Some(start),
                end_time: Some(start + Duration::hours(1)),
                attendees: vec![Attendee::new("student@x.com")],
            },
        );
        let registry = SlotRegistry::new(CalendarConfig::new(CALENDAR), calendar.clone());
        registry.load().await.unwrap();
        assert_eq!(registry.get("gone").await.unwrap().state, SlotState::Cancelled);

        let slot = registry.cancel("gone", None).await.unwrap();

        assert_eq!(slot.state, SlotState::Available);
        let record = calendar.record(CALENDAR, "gone").unwrap();
        assert!(!record.is_cancelled());
        assert_eq!(record.summary, "Available Slot");
        assert!(record.attendees.is_empty());
        let available: Vec<String> = registry.list_available().await.into_iter().map(|s| s.id).collect();
        assert_eq!(available, vec!["gone".to_string()]);
        registry.book("gone", "student@x.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_volunteer_rejects_the_booked_student() {
        let s = setup().await;
        s.registry.book(&s.slot_id, "student@x.com").await.unwrap();

        let err = s
            .registry
            .volunteer(&s.slot_id, "Student@X.com")
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::SameParty { .. }));
        let slot = s.registry.get(&s.slot_id).await.unwrap();
        assert_eq!(slot.state, SlotState::Requested);
        assert_eq!(slot.tutor_email, None);
        assert_eq!(s.calendar.calls(Operation::Update), 1);
    }

    #[tokio::test]
    async fn test_load_rejects_unusable_lookahead() {
        for days in [1_000_000_000, i64::MAX, 0, -5] {
            let calendar = Arc::new(MemoryCalendarService::new());
            let mut config = CalendarConfig::new(CALENDAR);
            config.lookahead_days = Some(days);
            let registry = SlotRegistry::new(config, calendar.clone());

            let err = registry.load().await.unwrap_err();
            assert!(
                matches!(err, BookingError::InvalidLookahead { days: d } if d == days),
                "{} days gave {:?}",
                days,
                err
            );
            assert_eq!(calendar.calls(Operation::List), 0);
        }
    }

    #[tokio::test]
    async fn test_load_respects_lookahead() {
        let calendar = Arc::new(MemoryCalendarService::new());
        let now = Utc::now();
        calendar.add_open_slot(CALENDAR, now + Duration::days(1), now + Duration::days(1) + Duration::hours(1));
        calendar.add_open_slot(CALENDAR, now + Duration::days(40), now + Duration::days(40) + Duration::hours(1));
        let mut config = CalendarConfig::new(CALENDAR);
        config.lookahead_days = Some(30);
        let registry = SlotRegistry::new(config, calendar);

        assert_eq!(registry.load().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_is_remote_error() {
        let calendar = Arc::new(MemoryCalendarService::new());
        calendar.fail_next(Operation::List, 1);
        let registry = SlotRegistry::new(CalendarConfig::new(CALENDAR), calendar);

        let err = registry.load().await.unwrap_err();
        assert!(matches!(err, BookingError::RemoteService { operation: "list", .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_notifications_follow_config() {
        let calendar = Arc::new(MemoryCalendarService::new());
        let start = Utc::now() + Duration::hours(1);
        let slot_id = calendar.add_open_slot(CALENDAR, start, start + Duration::hours(1));
        let mut config = CalendarConfig::new(CALENDAR);
        config.notify_attendees = false;
        let registry = SlotRegistry::new(config, calendar.clone());
        registry.track(Slot::available(slot_id.clone(), Some(start), None)).await;

        registry.book(&slot_id, "student@x.com").await.unwrap();
        assert!(calendar.notified().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_updates_acceptance_only() {
        let s = staffed_setup().await;
        s.calendar
            .respond(CALENDAR, &s.slot_id, "tutor@x.com", ResponseStatus::Accepted);
        let updates_before = s.calendar.calls(Operation::Update);

        let slot = s.registry.refresh(&s.slot_id).await.unwrap();

        assert!(slot.tutor_accepted);
        assert!(!slot.student_accepted);
        assert_eq!(slot.state, SlotState::Staffed);
        assert_eq!(s.calendar.calls(Operation::Update), updates_before);
        assert_eq!(s.registry.get(&s.slot_id).await.unwrap(), slot);
    }
}
