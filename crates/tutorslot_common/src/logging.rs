//! Logging utilities for Tutorslot.
//!
//! One place to install the tracing subscriber so every binary and test logs the
//! same way.

use tracing::{info, Level};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber at INFO.
///
/// # Examples
///
/// ```
/// use tutorslot_common::logging;
///
/// logging::init();
/// ```
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific level for the tutorslot crates.
///
/// `RUST_LOG` directives still apply on top. Calling this more than once is harmless.
pub fn init_with_level(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(
        format!("tutorslot={}", level)
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into()),
    );

    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

/// Parses a level name from configuration, falling back to INFO.
pub fn parse_level(level: &str) -> Level {
    level.parse::<Level>().unwrap_or(Level::INFO)
}
