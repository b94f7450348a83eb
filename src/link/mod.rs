//! Vehicle link providers
//!
//! The session manager talks to vehicles only through [`VehicleLink`].
//! Which implementation backs it is decided once at startup:
//! - `mavlink`: real autopilot over serial/UDP/TCP (cargo feature `mavlink`)
//! - `sim`: in-process simulated vehicle
//! - `mock`: no link at all; every operation reports simulated success

mod provider;
pub mod sim;
pub mod traits;

pub use provider::{Backend, LinkProvider};
pub use sim::{SimConnector, SimProfile};
pub use traits::{
    Attitude, BatteryReading, GpsReading, LinkConnector, LinkReading, Position, VehicleLink,
};
