// --- File: crates/services/tutorslot_cli/src/commands.rs ---
//! Command-line parsing.
//!
//! `tutorslot <command> [--id ID] [--email EMAIL] [--role student|tutor]`.
//! Flags accept both `--flag value` and `--flag=value`.

use tutorslot_booking::{Actor, Role, SlotId};
use tutorslot_common::{usage_error, TutorslotError};

pub const USAGE: &str = "\
Usage: tutorslot <command> [options]

Commands:
  list                                         List available slots
  book --id ID --email EMAIL                   Request a slot as a student
  volunteer --id ID --email EMAIL              Staff a requested slot as a tutor
  cancel --id ID [--email EMAIL --role ROLE]   Reset a slot to available
  cancel-if-unaccepted --id ID --email EMAIL --role ROLE
                                               Cancel unless the other party accepted
  delete --id ID                               Remove a slot from the calendar
  help                                         Show this message

ROLE is `student` or `tutor`.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Book { slot_id: SlotId, email: String },
    Volunteer { slot_id: SlotId, email: String },
    Cancel { slot_id: SlotId, actor: Option<Actor> },
    CancelIfUnaccepted { slot_id: SlotId, actor: Actor },
    Delete { slot_id: SlotId },
    Help,
}

#[derive(Debug, Default)]
struct Flags {
    id: Option<String>,
    email: Option<String>,
    role: Option<String>,
}

impl Flags {
    fn parse(args: &[String]) -> Result<Self, TutorslotError> {
        let mut flags = Flags::default();
        let mut rest = args.iter();

        while let Some(arg) = rest.next() {
            let (name, inline_value) = match arg.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (arg.as_str(), None),
            };
            let slot = match name {
                "--id" => &mut flags.id,
                "--email" => &mut flags.email,
                "--role" => &mut flags.role,
                other => return Err(usage_error(format!("unexpected argument '{}'", other))),
            };
            let value = match inline_value {
                Some(value) => value,
                None => rest
                    .next()
                    .cloned()
                    .ok_or_else(|| usage_error(format!("{} needs a value", name)))?,
            };
            if value.trim().is_empty() {
                return Err(usage_error(format!("{} needs a value", name)));
            }
            if slot.replace(value).is_some() {
                return Err(usage_error(format!("{} given twice", name)));
            }
        }
        Ok(flags)
    }

    fn require_id(&mut self) -> Result<SlotId, TutorslotError> {
        self.id.take().ok_or_else(|| usage_error("--id is required"))
    }

    fn require_email(&mut self) -> Result<String, TutorslotError> {
        self.email.take().ok_or_else(|| usage_error("--email is required"))
    }

    fn actor(&mut self) -> Result<Option<Actor>, TutorslotError> {
        match (self.email.take(), self.role.take()) {
            (None, None) => Ok(None),
            (Some(email), Some(role)) => {
                let role = role.parse::<Role>().map_err(usage_error)?;
                Ok(Some(Actor::new(email, role)))
            }
            _ => Err(usage_error("--email and --role must be given together")),
        }
    }

    /// Rejects flags the command does not take.
    fn finish(self, command: &str) -> Result<(), TutorslotError> {
        let unused = [("--id", &self.id), ("--email", &self.email), ("--role", &self.role)]
            .into_iter()
            .find(|(_, value)| value.is_some());
        match unused {
            Some((name, _)) => Err(usage_error(format!("{} does not take {}", command, name))),
            None => Ok(()),
        }
    }
}

impl Command {
    /// Parses the arguments after the program name.
    pub fn parse(args: &[String]) -> Result<Self, TutorslotError> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };
        let mut flags = Flags::parse(rest)?;

        let command = match name.as_str() {
            "list" => Command::List,
            "book" => Command::Book {
                slot_id: flags.require_id()?,
                email: flags.require_email()?,
            },
            "volunteer" => Command::Volunteer {
                slot_id: flags.require_id()?,
                email: flags.require_email()?,
            },
            "cancel" => Command::Cancel {
                slot_id: flags.require_id()?,
                actor: flags.actor()?,
            },
            "cancel-if-unaccepted" => {
                let slot_id = flags.require_id()?;
                let actor = flags
                    .actor()?
                    .ok_or_else(|| usage_error("cancel-if-unaccepted needs --email and --role"))?;
                Command::CancelIfUnaccepted { slot_id, actor }
            }
            "delete" => Command::Delete {
                slot_id: flags.require_id()?,
            },
            "help" | "--help" | "-h" => Command::Help,
            other => return Err(usage_error(format!("unknown command '{}'", other))),
        };

        flags.finish(name)?;
        Ok(command)
    }
}
