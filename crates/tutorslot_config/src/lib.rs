// --- File: crates/tutorslot_config/src/lib.rs ---
use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub mod models;

pub use models::*;

/// Prefix for configuration environment variables, e.g. `TUTORSLOT__CALENDAR__CALENDAR_ID`.
pub const ENV_PREFIX: &str = "TUTORSLOT";

/// Separator between nested keys in environment variable names.
pub const ENV_SEPARATOR: &str = "__";

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Unknown display time zone: {0}")]
    InvalidTimezone(String),
    #[error("calendar.lookahead_days must be between 1 and 3650, got {0}")]
    InvalidLookahead(i64),
}

/// Loads the application configuration.
///
/// Sources, later ones overriding earlier ones:
/// 1. `{config_dir}/default.*`
/// 2. `{config_dir}/{RUN_ENV}.*` (RUN_ENV defaults to "debug")
/// 3. `TUTORSLOT__*` environment variables (including those from `.env`)
///
/// `config_dir` is `TUTORSLOT_CONFIG_DIR` or `./config`.
pub fn load_config() -> Result<AppConfig, ConfigLoadError> {
    ensure_dotenv_loaded();

    let config_dir = env::var("TUTORSLOT_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());

    load_config_from(
        &config_dir,
        &run_env,
        Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR),
    )
}

/// Loads configuration from an explicit directory and environment source.
pub fn load_config_from(
    config_dir: &Path,
    run_env: &str,
    environment: Environment,
) -> Result<AppConfig, ConfigLoadError> {
    let default_path = config_dir.join("default");
    let env_path = config_dir.join(run_env);

    debug!("config: default_path: {}", default_path.display());
    debug!("config: env_path: {}", env_path.display());

    let builder = Config::builder()
        .add_source(File::from(default_path).required(false))
        .add_source(File::from(env_path).required(false))
        .add_source(environment);

    let app_config: AppConfig = builder.build()?.try_deserialize()?;
    // Fail early on a bad zone rather than at first print.
    app_config.display_tz()?;
    app_config.calendar.check_lookahead()?;
    Ok(app_config)
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables.
///
/// `DOTENV_OVERRIDE` selects the file; it defaults to `.env`. A missing file is not an error.
/// Returns the path that was used.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path = env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}
