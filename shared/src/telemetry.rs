//! Telemetry snapshot returned by the `telemetry` operation

use crate::defaults;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the vehicle
///
/// Recomputed from the live link on every request. Sub-readings the vehicle
/// has not reported are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub connected: bool,
    pub armed: bool,
    pub mode: String,
    pub lat: f64,
    pub lon: f64,
    /// Altitude relative to home, meters
    pub alt: f64,
    pub groundspeed: f32,
    pub airspeed: f32,
    /// Heading in degrees
    pub heading: f32,
    pub battery_voltage: f32,
    pub battery_remaining: u8,
    pub gps_fix: u8,
    pub satellites: u8,
    /// Attitude in radians
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub port: Option<String>,
}

impl TelemetrySnapshot {
    /// Fixed snapshot reported while no vehicle is connected
    pub fn disconnected(port: Option<String>) -> Self {
        let (lat, lon) = defaults::FALLBACK_POSITION;
        Self::fallback(lat, lon, port)
    }

    /// Disconnected snapshot at a configured fallback coordinate
    pub fn fallback(lat: f64, lon: f64, port: Option<String>) -> Self {
        Self {
            connected: false,
            armed: false,
            mode: defaults::DISCONNECTED_MODE.into(),
            lat,
            lon,
            alt: 0.0,
            groundspeed: 0.0,
            airspeed: 0.0,
            heading: 0.0,
            battery_voltage: 0.0,
            battery_remaining: 0,
            gps_fix: 0,
            satellites: 0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            port,
        }
    }
}

/// Telemetry response: a snapshot, or the error form when a live read fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryReport {
    Snapshot(TelemetrySnapshot),
    Unavailable { connected: bool, error: String },
}

impl TelemetryReport {
    /// Error form for a read that failed mid-way
    pub fn unavailable(error: impl Into<String>) -> Self {
        TelemetryReport::Unavailable {
            connected: false,
            error: error.into(),
        }
    }

    pub fn connected(&self) -> bool {
        match self {
            TelemetryReport::Snapshot(s) => s.connected,
            TelemetryReport::Unavailable { connected, .. } => *connected,
        }
    }

    pub fn snapshot(&self) -> Option<&TelemetrySnapshot> {
        match self {
            TelemetryReport::Snapshot(s) => Some(s),
            TelemetryReport::Unavailable { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disconnected_snapshot() {
        let snap = TelemetrySnapshot::disconnected(None);
        assert!(!snap.connected);
        assert!(!snap.armed);
        assert_eq!(snap.mode, "DISARMED");
        assert_eq!(snap.lat, 28.6139);
        assert_eq!(snap.lon, 77.2090);
        assert_eq!(snap.alt, 0.0);
        assert_eq!(snap.satellites, 0);
    }

    #[test]
    fn test_unavailable_shape() {
        let report = TelemetryReport::unavailable("link lost: broken pipe");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({"connected": false, "error": "link lost: broken pipe"})
        );
        assert!(report.snapshot().is_none());
    }

    #[test]
    fn test_snapshot_field_names() {
        let report = TelemetryReport::Snapshot(TelemetrySnapshot::disconnected(Some("COM3".into())));
        let value = serde_json::to_value(&report).unwrap();
        for key in [
            "connected", "armed", "mode", "lat", "lon", "alt", "groundspeed", "airspeed",
            "heading", "battery_voltage", "battery_remaining", "gps_fix", "satellites", "roll",
            "pitch", "yaw", "port",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["port"], "COM3");
    }
}
