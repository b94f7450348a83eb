//! Vehicle link abstraction for pluggable link backends

use anyhow::Result;
use async_trait::async_trait;

/// Global position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// Attitude in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryReading {
    pub voltage: Option<f32>,
    pub level: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpsReading {
    pub fix_type: u8,
    pub satellites: Option<u8>,
}

/// Raw telemetry read from a link
///
/// Each sub-reading is independent; `None` means the vehicle has not
/// reported it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkReading {
    pub armed: bool,
    pub mode: String,
    pub position: Option<Position>,
    pub relative_alt: Option<f64>,
    pub groundspeed: Option<f32>,
    pub airspeed: Option<f32>,
    pub heading: Option<f32>,
    pub battery: Option<BatteryReading>,
    pub gps: Option<GpsReading>,
    pub attitude: Option<Attitude>,
}

/// An open link to one vehicle
///
/// All methods take `&self`; implementations keep their own interior state so
/// that read-back polls can borrow the link while waiting.
#[async_trait]
pub trait VehicleLink: Send + Sync {
    /// Vehicle-reported readiness to arm
    async fn is_armable(&self) -> Result<bool>;

    async fn armed(&self) -> Result<bool>;

    /// Current flight mode name
    async fn mode(&self) -> Result<String>;

    /// Request a flight mode by name (no read-back)
    async fn set_mode(&self, name: &str) -> Result<()>;

    /// Request arm/disarm (no read-back)
    async fn set_armed(&self, armed: bool) -> Result<()>;

    /// Take off to an altitude relative to home
    async fn takeoff(&self, altitude_m: f32) -> Result<()>;

    /// Navigate to a global position with relative altitude
    async fn goto(&self, lat: f64, lon: f64, altitude_m: f32) -> Result<()>;

    async fn telemetry(&self) -> Result<LinkReading>;

    /// Vehicle type reported by the autopilot, if known
    async fn vehicle_type(&self) -> Option<String>;

    /// Release the link
    async fn close(&self) -> Result<()>;
}

/// Factory for opening vehicle links
#[async_trait]
pub trait LinkConnector: Send + Sync {
    /// Open a link and wait until the vehicle is ready.
    ///
    /// Unbounded: callers apply their own timeout and cancel by dropping
    /// the future.
    async fn open(&self, endpoint: &str, baud: u32) -> Result<Box<dyn VehicleLink>>;

    /// Human-readable name for this backend
    fn name(&self) -> &'static str;
}
