// --- File: crates/services/tutorslot_cli/src/app.rs ---
//! Wiring between configuration, the Google Calendar backend and the slot registry,
//! and the execution of one parsed command.

use chrono_tz::Tz;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use tutorslot_booking::{BookingError, Slot, SlotRegistry};
use tutorslot_common::{config_error, external_service_error, exit_code, CalendarService, ExitStatus, TutorslotError};
use tutorslot_config::AppConfig;
use tutorslot_gcal::{create_calendar_hub, GoogleCalendarService};

use crate::commands::{Command, USAGE};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Setup(#[from] TutorslotError),
    #[error(transparent)]
    Booking(#[from] BookingError),
}

impl ExitStatus for CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Setup(e) => e.exit_code(),
            CliError::Booking(e) => e.exit_code(),
        }
    }
}

/// Authenticates against Google Calendar and hydrates a registry from the configured calendar.
pub async fn connect(config: &AppConfig) -> Result<SlotRegistry<GoogleCalendarService>, CliError> {
    if config.calendar.key_path.is_none() {
        return Err(config_error("calendar.key_path is not set").into());
    }
    let hub = create_calendar_hub(&config.calendar)
        .await
        .map_err(|e| external_service_error("Google Calendar", e))?;
    let service = Arc::new(GoogleCalendarService::new(Arc::new(hub)));

    let registry = SlotRegistry::new(config.calendar.clone(), service);
    let tracked = registry.load().await?;
    debug!("Registry ready with {} slots", tracked);
    Ok(registry)
}

/// Runs one command against a hydrated registry and returns the text to print.
pub async fn execute<S: CalendarService>(
    registry: &SlotRegistry<S>,
    command: Command,
    tz: Tz,
) -> Result<String, CliError> {
    let output = match command {
        Command::Help => USAGE.to_string(),
        Command::List => {
            let available = registry.list_available().await;
            if available.is_empty() {
                "No available slots.".to_string()
            } else {
                available
                    .iter()
                    .map(|slot| format_slot(slot, tz))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        Command::Book { slot_id, email } => {
            let slot = registry.book(&slot_id, &email).await?;
            format!("Requested slot {} for {}. Status: {}", slot.id, email, slot.state)
        }
        Command::Volunteer { slot_id, email } => {
            let slot = registry.volunteer(&slot_id, &email).await?;
            format!("{} is now tutoring slot {}. Status: {}", email, slot.id, slot.state)
        }
        Command::Cancel { slot_id, actor } => {
            let slot = registry.cancel(&slot_id, actor.as_ref()).await?;
            format!("Cancelled slot {}. Status: {}", slot.id, slot.state)
        }
        Command::CancelIfUnaccepted { slot_id, actor } => {
            let slot = registry.cancel_if_unaccepted(&slot_id, &actor).await?;
            format!("Cancelled slot {}. Status: {}", slot.id, slot.state)
        }
        Command::Delete { slot_id } => {
            let slot = registry.delete(&slot_id).await?;
            info!("Deleted slot {} (was {})", slot.id, slot.state);
            format!("Deleted slot {}.", slot.id)
        }
    };
    Ok(output)
}

/// One `list` line: `ID: {id} | {summary} | Start: {start}`.
pub fn format_slot(slot: &Slot, tz: Tz) -> String {
    let start = slot
        .start_time
        .map(|start| start.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z").to_string())
        .unwrap_or_else(|| "unscheduled".to_string());
    format!("ID: {} | {} | Start: {}", slot.id, slot.mirror().summary, start)
}

/// Exit code for a finished run.
pub fn exit_status<T>(result: &Result<T, CliError>) -> i32 {
    match result {
        Ok(_) => exit_code::SUCCESS,
        Err(e) => e.exit_code(),
    }
}
