//! UAV vehicle session manager
//!
//! Owns one vehicle link at a time and exposes the connect / arm / takeoff /
//! land / goto / telemetry command surface over it. The link backend
//! (MAVLink, simulated or mock) is chosen once at startup.

pub mod command;
pub mod config;
pub mod link;
#[cfg(feature = "mavlink")]
pub mod mavlink;
pub mod ports;
pub mod session;
pub mod wait;

pub use config::SessionConfig;
pub use link::{Backend, LinkProvider};
pub use ports::{FixedPorts, PortScanner, SerialPortScanner};
pub use session::SessionManager;
