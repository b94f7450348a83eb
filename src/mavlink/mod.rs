//! MAVLink Link Module
//!
//! Real vehicle link to ArduPilot flight controllers over serial, UDP or TCP.

mod commands;
mod connection;
mod telemetry;

pub use commands::{mode_to_string, ArduPilotMode, MavCommandSender};
pub use connection::{LinkEndpoint, MavlinkConfig, MavlinkConnector, MavlinkLink};
pub use telemetry::TelemetryReader;
