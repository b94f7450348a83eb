//! Command surface of the one-shot CLI
//!
//! This module handles:
//! - Parsing a command name and its positional arguments
//! - Dispatching the command to the session manager
//! - Shaping the single JSON reply

mod executor;

pub use executor::{execute, Reply};

use thiserror::Error;
use utms_shared::{defaults, COMMAND_NAMES};

/// A parsed vehicle command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ScanPorts,
    AutoConnect,
    Connect { port: String, baud: u32 },
    Disconnect,
    Telemetry,
    Arm,
    Disarm,
    Mode { name: String },
    Takeoff { altitude_m: f32 },
    Land,
    Goto { lat: f64, lon: f64, alt_m: f32 },
}

/// Errors from parsing a command line
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("{command}: missing argument <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("{command}: invalid {argument} '{value}'")]
    InvalidArgument {
        command: &'static str,
        argument: &'static str,
        value: String,
    },
}

impl Command {
    /// Parse `name` and its positional arguments, filling in defaults
    pub fn parse<S: AsRef<str>>(name: &str, args: &[S]) -> Result<Self, CommandError> {
        let args = Args {
            command: name,
            values: args.iter().map(AsRef::as_ref).collect(),
        };

        let command = match name {
            "scan_ports" => Command::ScanPorts,
            "auto_connect" => Command::AutoConnect,
            "connect" => Command::Connect {
                port: args.get(0).unwrap_or(defaults::CLI_PORT).to_string(),
                baud: args.number(1, "baud")?.unwrap_or(defaults::CLI_BAUD),
            },
            "disconnect" => Command::Disconnect,
            "telemetry" => Command::Telemetry,
            "arm" => Command::Arm,
            "disarm" => Command::Disarm,
            "mode" => Command::Mode {
                name: args.get(0).unwrap_or(defaults::MODE).to_string(),
            },
            "takeoff" => Command::Takeoff {
                altitude_m: args
                    .number(0, "altitude")?
                    .unwrap_or(defaults::TAKEOFF_ALTITUDE_M),
            },
            "land" => Command::Land,
            "goto" => Command::Goto {
                lat: args.required(0, "lat")?,
                lon: args.required(1, "lon")?,
                alt_m: args.required(2, "alt")?,
            },
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }

    /// Name as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Command::ScanPorts => COMMAND_NAMES[0],
            Command::AutoConnect => COMMAND_NAMES[1],
            Command::Connect { .. } => COMMAND_NAMES[2],
            Command::Disconnect => COMMAND_NAMES[3],
            Command::Telemetry => COMMAND_NAMES[4],
            Command::Arm => COMMAND_NAMES[5],
            Command::Disarm => COMMAND_NAMES[6],
            Command::Mode { .. } => COMMAND_NAMES[7],
            Command::Takeoff { .. } => COMMAND_NAMES[8],
            Command::Land => COMMAND_NAMES[9],
            Command::Goto { .. } => COMMAND_NAMES[10],
        }
    }
}

struct Args<'a> {
    command: &'a str,
    values: Vec<&'a str>,
}

impl<'a> Args<'a> {
    fn get(&self, index: usize) -> Option<&'a str> {
        self.values.get(index).copied()
    }

    fn static_name(&self) -> &'static str {
        COMMAND_NAMES
            .iter()
            .copied()
            .find(|name| *name == self.command)
            .unwrap_or("command")
    }

    fn number<T: std::str::FromStr>(
        &self,
        index: usize,
        argument: &'static str,
    ) -> Result<Option<T>, CommandError> {
        match self.get(index) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| CommandError::InvalidArgument {
                    command: self.static_name(),
                    argument,
                    value: raw.to_string(),
                }),
        }
    }

    fn required<T: std::str::FromStr>(
        &self,
        index: usize,
        argument: &'static str,
    ) -> Result<T, CommandError> {
        self.number(index, argument)?
            .ok_or(CommandError::MissingArgument {
                command: self.static_name(),
                argument,
            })
    }
}
