// --- File: crates/tutorslot_config/src/models.rs ---

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::ConfigLoadError;

/// Upper bound for `calendar.lookahead_days`, roughly ten years.
pub const MAX_LOOKAHEAD_DAYS: i64 = 3650;

// --- Calendar Config ---
// The service account key itself is never read here, only its location.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CalendarConfig {
    /// Identifier of the shared organizational calendar.
    pub calendar_id: String,
    /// Path to the Google service account JSON key.
    #[serde(default)]
    pub key_path: Option<String>,
    /// Whether attendees get notified on every mirrored update (`sendUpdates=all`).
    #[serde(default = "default_notify_attendees")]
    pub notify_attendees: bool,
    /// Only events starting within this many days are loaded. `None` loads everything upcoming.
    #[serde(default)]
    pub lookahead_days: Option<i64>,
}

fn default_notify_attendees() -> bool {
    true
}

impl CalendarConfig {
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            key_path: None,
            notify_attendees: default_notify_attendees(),
            lookahead_days: None,
        }
    }

    /// A look-ahead, when set, must be a positive number of days up to [`MAX_LOOKAHEAD_DAYS`].
    pub fn check_lookahead(&self) -> Result<(), ConfigLoadError> {
        match self.lookahead_days {
            Some(days) if !(1..=MAX_LOOKAHEAD_DAYS).contains(&days) => {
                Err(ConfigLoadError::InvalidLookahead(days))
            }
            _ => Ok(()),
        }
    }
}

// --- Logging Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// IANA time zone used when printing slot times, e.g. "Europe/Zurich".
    #[serde(default = "default_display_timezone")]
    pub display_timezone: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_display_timezone() -> String {
    "UTC".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            display_timezone: default_display_timezone(),
        }
    }
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    // Calendar config is mandatory
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Parses the configured display time zone.
    pub fn display_tz(&self) -> Result<Tz, ConfigLoadError> {
        self.logging
            .display_timezone
            .parse::<Tz>()
            .map_err(|_| ConfigLoadError::InvalidTimezone(self.logging.display_timezone.clone()))
    }
}
