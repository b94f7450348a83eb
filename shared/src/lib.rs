//! UTMS Shared Types
//!
//! This crate provides the response envelopes, telemetry snapshot and error
//! taxonomy shared by the one-shot command line and the persistent server.

pub mod codec;
mod error;
mod ports;
mod result;
mod telemetry;

pub use error::{FailureKind, SessionError};
pub use ports::PortInfo;
pub use result::CommandResult;
pub use telemetry::{TelemetryReport, TelemetrySnapshot};

/// Names of every command accepted by the command surface, in display order
pub const COMMAND_NAMES: [&str; 11] = [
    "scan_ports",
    "auto_connect",
    "connect",
    "disconnect",
    "telemetry",
    "arm",
    "disarm",
    "mode",
    "takeoff",
    "land",
    "goto",
];

/// Suffix attached to every message produced in mock mode
pub const MOCK_TAG: &str = " (MOCK MODE)";

/// Default connection parameters for both deployments
pub mod defaults {
    /// Serial port used by the command line when `connect` has no port argument
    pub const CLI_PORT: &str = "COM3";

    /// Baud rate used by the command line when `connect` has no baud argument
    pub const CLI_BAUD: u32 = 57600;

    /// Serial port used by the server when the connect body omits it
    pub const SERVER_PORT: &str = "COM6";

    /// Baud rate used by the server when the connect body omits it
    pub const SERVER_BAUD: u32 = 9600;

    /// Baud rates tried by auto-connect, in priority order
    pub const AUTO_CONNECT_BAUDS: [u32; 3] = [57600, 115200, 9600];

    /// Flight mode requested by `mode` without an argument
    pub const MODE: &str = "GUIDED";

    /// Takeoff altitude in meters when none is given
    pub const TAKEOFF_ALTITUDE_M: f32 = 10.0;

    /// Goto altitude in meters when the server body omits it
    pub const GOTO_ALTITUDE_M: f32 = 10.0;

    /// Coordinate reported while no vehicle is connected (lat, lon)
    pub const FALLBACK_POSITION: (f64, f64) = (28.6139, 77.2090);

    /// Mode name reported while no vehicle is connected
    pub const DISCONNECTED_MODE: &str = "DISARMED";
}
