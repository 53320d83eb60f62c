#[cfg(test)]
mod tests {
    use crate::{Actor, Role, Slot, SlotRegistry, SlotState};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use std::sync::Arc;
    use tutorslot_common::services::memory::{MemoryCalendarService, Operation};
    use tutorslot_common::{Attendee, CalendarRecord, ResponseStatus};
    use tutorslot_config::CalendarConfig;

    const CALENDAR: &str = "prop-calendar";

    #[derive(Debug, Clone)]
    enum Op {
        Book(usize),
        Volunteer(usize),
        Cancel,
        GuardedCancel(Role, usize),
        Accept(Role),
        FailNextUpdate,
    }

    const EMAILS: [&str; 3] = ["ana@x.com", "ben@x.com", "cho@x.com"];

    fn op_strategy() -> impl Strategy<Value = Op> {
        let role = prop_oneof![Just(Role::Student), Just(Role::Tutor)];
        prop_oneof![
            (0..EMAILS.len()).prop_map(Op::Book),
            (0..EMAILS.len()).prop_map(Op::Volunteer),
            Just(Op::Cancel),
            (role.clone(), 0..EMAILS.len()).prop_map(|(r, i)| Op::GuardedCancel(r, i)),
            role.prop_map(Op::Accept),
            Just(Op::FailNextUpdate),
        ]
    }

    // Any slot the registry can legally hold, with attendee responses.
    fn legal_slot() -> impl Strategy<Value = (Slot, bool, bool)> {
        (0..3usize, 0..EMAILS.len(), 0..EMAILS.len(), any::<bool>(), any::<bool>()).prop_map(
            |(state, student, tutor, student_accepted, tutor_accepted)| {
                let mut slot = Slot::available("evt", None, None);
                if state >= 1 {
                    slot.state = SlotState::Requested;
                    slot.student_email = Some(EMAILS[student].to_string());
                }
                if state == 2 {
                    // Anyone but the student.
                    let tutor = (student + 1 + tutor % (EMAILS.len() - 1)) % EMAILS.len();
                    slot.state = SlotState::Staffed;
                    slot.tutor_email = Some(EMAILS[tutor].to_string());
                }
                (slot, student_accepted, tutor_accepted)
            },
        )
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build test runtime")
    }

    proptest! {
        // Hydrating a slot from its own mirror gives the slot back.
        #[test]
        fn test_mirror_round_trips_through_record((slot, student_ok, tutor_ok) in legal_slot()) {
            let mirror = slot.mirror();
            let attendees: Vec<Attendee> = mirror
                .attendees
                .iter()
                .enumerate()
                .map(|(i, email)| {
                    let accepted = if i == 0 { student_ok } else { tutor_ok };
                    Attendee {
                        email: email.clone(),
                        response_status: if accepted { ResponseStatus::Accepted } else { ResponseStatus::NeedsAction },
                    }
                })
                .collect();
            let record = CalendarRecord {
                event_id: slot.id.clone(),
                summary: mirror.summary.clone(),
                status: "confirmed".to_string(),
                start_time: slot.start_time,
                end_time: slot.end_time,
                attendees,
            };

            let mut expected = slot.clone();
            expected.student_accepted = slot.student_email.is_some() && student_ok;
            expected.tutor_accepted = slot.tutor_email.is_some() && tutor_ok;

            let hydrated = Slot::from_record(&record);
            prop_assert_eq!(hydrated, Some(expected));
        }

        // Whatever happens, the local slot stays consistent and agrees with the calendar.
        #[test]
        fn test_random_operations_keep_invariants(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let rt = runtime();
            rt.block_on(async {
                let calendar = Arc::new(MemoryCalendarService::new());
                let start = Utc::now() + Duration::hours(1);
                let slot_id = calendar.add_open_slot(CALENDAR, start, start + Duration::hours(1));
                let registry = SlotRegistry::new(CalendarConfig::new(CALENDAR), calendar.clone());
                registry.load().await.unwrap();

                for op in ops {
                    let before = registry.get(&slot_id).await.unwrap();
                    let updates_before = calendar.calls(Operation::Update);

                    let result = match op {
                        Op::Book(i) => registry.book(&slot_id, EMAILS[i]).await.map(|_| ()),
                        Op::Volunteer(i) => registry.volunteer(&slot_id, EMAILS[i]).await.map(|_| ()),
                        Op::Cancel => registry.cancel(&slot_id, None).await.map(|_| ()),
                        Op::GuardedCancel(role, i) => registry
                            .cancel_if_unaccepted(&slot_id, &Actor::new(EMAILS[i], role))
                            .await
                            .map(|_| ()),
                        Op::Accept(role) => {
                            if let Some(email) = before.email_for(role) {
                                calendar.respond(CALENDAR, &slot_id, email, ResponseStatus::Accepted);
                            }
                            Ok(())
                        }
                        Op::FailNextUpdate => {
                            calendar.fail_next(Operation::Update, 1);
                            Ok(())
                        }
                    };

                    let after = registry.get(&slot_id).await.unwrap();
                    prop_assert!(after.is_consistent(), "inconsistent slot {:?}", after);

                    let updates = calendar.calls(Operation::Update) - updates_before;
                    prop_assert!(updates <= 1, "more than one update per operation");
                    if result.is_err() {
                        // Rejected or rolled back: only acceptance flags may have been refreshed.
                        prop_assert_eq!(after.state, before.state);
                        prop_assert_eq!(&after.student_email, &before.student_email);
                        prop_assert_eq!(&after.tutor_email, &before.tutor_email);
                    }

                    let record = calendar.record(CALENDAR, &slot_id).unwrap();
                    let mirror = after.mirror();
                    let remote: Vec<String> = record.attendees.iter().map(|a| a.email.clone()).collect();
                    prop_assert_eq!(record.summary, mirror.summary);
                    prop_assert_eq!(remote, mirror.attendees);
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
