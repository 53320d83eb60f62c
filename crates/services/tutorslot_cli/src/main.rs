// File: services/tutorslot_cli/src/main.rs
use std::env;
use tracing::error;
use tutorslot_common::{logging, TutorslotError};
use tutorslot_config::load_config;

mod app;
mod commands;

use app::{exit_status, CliError};
use commands::Command;

async fn run(args: &[String]) -> Result<String, CliError> {
    let command = Command::parse(args)?;
    if command == Command::Help {
        return Ok(commands::USAGE.to_string());
    }

    let config = load_config().map_err(TutorslotError::from)?;
    logging::init_with_level(logging::parse_level(&config.logging.level));
    let tz = config.display_tz().map_err(TutorslotError::from)?;

    let registry = app::connect(&config).await?;
    app::execute(&registry, command, tz).await
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let result = run(&args).await;
    match &result {
        Ok(output) => println!("{}", output),
        Err(CliError::Setup(TutorslotError::UsageError(message))) => {
            eprintln!("Error: {}\n\n{}", message, commands::USAGE);
        }
        Err(err) => {
            error!("Command failed: {}", err);
            eprintln!("Error: {}", err);
        }
    }
    std::process::exit(exit_status(&result));
}
