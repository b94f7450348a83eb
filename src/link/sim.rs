//! In-process simulated vehicle
//!
//! Honours the same contract as a real autopilot: arming needs an armable
//! vehicle, mode and arm requests are only visible through read-back, and
//! telemetry sub-readings can be missing. Every connect attempt and every
//! vehicle command is journaled so callers can inspect the sequence.

use super::traits::{
    Attitude, BatteryReading, GpsReading, LinkConnector, LinkReading, Position, VehicleLink,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Mode names the simulated autopilot accepts
const SIM_MODES: [&str; 8] = [
    "STABILIZE", "ALT_HOLD", "AUTO", "GUIDED", "LOITER", "RTL", "LAND", "POSHOLD",
];

/// Behaviour of the simulated vehicle
#[derive(Debug, Clone)]
pub struct SimProfile {
    /// Vehicle reports armable
    pub armable: bool,
    /// Mode requests are accepted but never take effect
    pub ignore_mode_requests: bool,
    /// Arm requests are accepted but never take effect
    pub ignore_arm_requests: bool,
    /// Vehicle has a GPS and reports position
    pub has_gps: bool,
    /// Every telemetry read fails as if the link dropped
    pub fail_telemetry: bool,
    /// Home position
    pub home: Position,
    pub battery_voltage: f32,
    pub battery_level: u8,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            armable: true,
            ignore_mode_requests: false,
            ignore_arm_requests: false,
            has_gps: true,
            fail_telemetry: false,
            home: Position {
                lat: -35.363261,
                lon: 149.165230,
            },
            battery_voltage: 12.6,
            battery_level: 100,
        }
    }
}

#[derive(Debug)]
struct SimVehicle {
    armed: bool,
    mode: String,
    position: Position,
    altitude: f64,
    closed: bool,
}

/// Opens simulated links
pub struct SimConnector {
    profile: SimProfile,
    /// `(port, baud)` pairs that open successfully; `None` accepts all
    accept: Option<Vec<(String, u32)>>,
    attempts: Arc<Mutex<Vec<(String, u32)>>>,
    journal: Arc<Mutex<Vec<String>>>,
}

impl Default for SimConnector {
    fn default() -> Self {
        Self::new(SimProfile::default())
    }
}

impl SimConnector {
    pub fn new(profile: SimProfile) -> Self {
        Self {
            profile,
            accept: None,
            attempts: Arc::new(Mutex::new(Vec::new())),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Only the given port/baud pair opens; everything else fails
    pub fn accept_only(mut self, port: &str, baud: u32) -> Self {
        self.accept = Some(vec![(port.to_string(), baud)]);
        self
    }

    /// Every open attempt fails
    pub fn reject_all(mut self) -> Self {
        self.accept = Some(Vec::new());
        self
    }

    /// Every `(port, baud)` pair passed to `open`, in order
    pub fn attempts(&self) -> Vec<(String, u32)> {
        lock(&self.attempts).clone()
    }

    /// Every command issued to any link opened by this connector, in order
    pub fn journal(&self) -> Vec<String> {
        lock(&self.journal).clone()
    }
}

#[async_trait]
impl LinkConnector for SimConnector {
    async fn open(&self, endpoint: &str, baud: u32) -> Result<Box<dyn VehicleLink>> {
        lock(&self.attempts).push((endpoint.to_string(), baud));

        if let Some(accept) = &self.accept {
            if !accept.iter().any(|(p, b)| p == endpoint && *b == baud) {
                bail!("no heartbeat from {} at {} baud", endpoint, baud);
            }
        }

        debug!(endpoint, baud, "simulated vehicle connected");
        let journal = self.journal.clone();
        lock(&journal).push(format!("open {}@{}", endpoint, baud));

        Ok(Box::new(SimLink {
            profile: self.profile.clone(),
            vehicle: Mutex::new(SimVehicle {
                armed: false,
                mode: "STABILIZE".into(),
                position: self.profile.home,
                altitude: 0.0,
                closed: false,
            }),
            journal,
        }))
    }

    fn name(&self) -> &'static str {
        "sim"
    }
}

/// Link to one simulated vehicle
pub struct SimLink {
    profile: SimProfile,
    vehicle: Mutex<SimVehicle>,
    journal: Arc<Mutex<Vec<String>>>,
}

impl SimLink {
    fn record(&self, entry: String) {
        lock(&self.journal).push(entry);
    }

    fn vehicle(&self) -> Result<MutexGuard<'_, SimVehicle>> {
        let vehicle = lock(&self.vehicle);
        if vehicle.closed {
            bail!("link closed");
        }
        Ok(vehicle)
    }
}

#[async_trait]
impl VehicleLink for SimLink {
    async fn is_armable(&self) -> Result<bool> {
        let _vehicle = self.vehicle()?;
        Ok(self.profile.armable)
    }

    async fn armed(&self) -> Result<bool> {
        Ok(self.vehicle()?.armed)
    }

    async fn mode(&self) -> Result<String> {
        Ok(self.vehicle()?.mode.clone())
    }

    async fn set_mode(&self, name: &str) -> Result<()> {
        let mode = name.to_ascii_uppercase();
        if !SIM_MODES.contains(&mode.as_str()) {
            bail!("Unknown flight mode: {}", name);
        }
        let mut vehicle = self.vehicle()?;
        self.record(format!("mode {}", mode));
        if !self.profile.ignore_mode_requests {
            vehicle.mode = mode;
        }
        Ok(())
    }

    async fn set_armed(&self, armed: bool) -> Result<()> {
        let mut vehicle = self.vehicle()?;
        self.record(if armed { "arm".into() } else { "disarm".into() });
        if !self.profile.ignore_arm_requests {
            if armed && !self.profile.armable {
                bail!("arming rejected: pre-arm checks failed");
            }
            vehicle.armed = armed;
        }
        Ok(())
    }

    async fn takeoff(&self, altitude_m: f32) -> Result<()> {
        let mut vehicle = self.vehicle()?;
        if !vehicle.armed {
            bail!("takeoff rejected: vehicle disarmed");
        }
        self.record(format!("takeoff {}", altitude_m));
        vehicle.altitude = altitude_m as f64;
        Ok(())
    }

    async fn goto(&self, lat: f64, lon: f64, altitude_m: f32) -> Result<()> {
        let mut vehicle = self.vehicle()?;
        self.record(format!("goto {} {} {}", lat, lon, altitude_m));
        vehicle.position = Position { lat, lon };
        vehicle.altitude = altitude_m as f64;
        Ok(())
    }

    async fn telemetry(&self) -> Result<LinkReading> {
        let vehicle = self.vehicle()?;
        if self.profile.fail_telemetry {
            return Err(anyhow!("link lost: simulated link dropped"));
        }

        let (position, gps) = if self.profile.has_gps {
            (
                Some(vehicle.position),
                Some(GpsReading {
                    fix_type: 3,
                    satellites: Some(10),
                }),
            )
        } else {
            (None, None)
        };

        Ok(LinkReading {
            armed: vehicle.armed,
            mode: vehicle.mode.clone(),
            position,
            relative_alt: Some(vehicle.altitude),
            groundspeed: Some(0.0),
            airspeed: Some(0.0),
            heading: Some(0.0),
            battery: Some(BatteryReading {
                voltage: Some(self.profile.battery_voltage),
                level: Some(self.profile.battery_level),
            }),
            gps,
            attitude: Some(Attitude::default()),
        })
    }

    async fn vehicle_type(&self) -> Option<String> {
        Some("QUADROTOR".into())
    }

    async fn close(&self) -> Result<()> {
        lock(&self.vehicle).closed = true;
        self.record("close".into());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mode_and_arm_read_back() {
        let connector = SimConnector::default();
        let link = connector.open("sim0", 57600).await.unwrap();

        assert!(link.is_armable().await.unwrap());
        assert_eq!(link.mode().await.unwrap(), "STABILIZE");

        link.set_mode("guided").await.unwrap();
        assert_eq!(link.mode().await.unwrap(), "GUIDED");

        link.set_armed(true).await.unwrap();
        assert!(link.armed().await.unwrap());

        assert_eq!(
            connector.journal(),
            vec!["open sim0@57600", "mode GUIDED", "arm"]
        );
    }

    #[tokio::test]
    async fn test_accept_only() {
        let connector = SimConnector::default().accept_only("COM4", 115200);
        assert!(connector.open("COM4", 57600).await.is_err());
        assert!(connector.open("COM4", 115200).await.is_ok());
        assert_eq!(
            connector.attempts(),
            vec![("COM4".to_string(), 57600), ("COM4".to_string(), 115200)]
        );
    }

    #[tokio::test]
    async fn test_unknown_mode_rejected() {
        let link = SimConnector::default().open("sim0", 57600).await.unwrap();
        let err = link.set_mode("HOVER").await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown flight mode: HOVER");
    }

    #[tokio::test]
    async fn test_closed_link_fails() {
        let link = SimConnector::default().open("sim0", 57600).await.unwrap();
        link.close().await.unwrap();
        assert!(link.telemetry().await.is_err());
        assert!(link.armed().await.is_err());
        assert!(link.is_armable().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_gps() {
        let profile = SimProfile {
            has_gps: false,
            ..Default::default()
        };
        let link = SimConnector::new(profile).open("sim0", 57600).await.unwrap();
        let reading = link.telemetry().await.unwrap();
        assert!(reading.position.is_none());
        assert!(reading.gps.is_none());
        assert!(reading.battery.is_some());
    }
}
