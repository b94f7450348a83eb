//! MAVLink Telemetry Reader
//!
//! Caches the latest value of every telemetry message the session reads.

use super::commands::mode_to_string;
use crate::link::{Attitude, BatteryReading, GpsReading, LinkReading, Position};
use anyhow::{bail, Result};
use mavlink::ardupilotmega::{MavAutopilot, MavMessage, MavModeFlag, MavState};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// EKF_PRED_POS_HORIZ_ABS
const EKF_PRED_POS_HORIZ_ABS: u32 = 0x200;

/// GPS fix types above this are usable for arming (2D fix or better)
const MIN_ARMABLE_FIX: u8 = 1;

#[derive(Debug, Clone)]
struct Heartbeat {
    armed: bool,
    custom_mode: u32,
    system_status: MavState,
    vehicle_type: String,
}

#[derive(Debug, Default)]
struct VehicleState {
    heartbeat: Option<Heartbeat>,
    position: Option<Position>,
    relative_alt: Option<f64>,
    groundspeed: Option<f32>,
    airspeed: Option<f32>,
    heading: Option<f32>,
    battery: Option<BatteryReading>,
    gps: Option<GpsReading>,
    attitude: Option<Attitude>,
    ekf_flags: Option<u32>,
    /// Set once the reader thread gives up
    lost: Option<String>,
}

/// Latest vehicle state decoded from the autopilot
#[derive(Clone, Default)]
pub struct TelemetryReader {
    state: Arc<RwLock<VehicleState>>,
}

impl TelemetryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a MAVLink message and update telemetry
    pub async fn process_message(&self, msg: &MavMessage) {
        match msg {
            MavMessage::HEARTBEAT(hb) => {
                // GCS and companion heartbeats share the link
                if hb.autopilot == MavAutopilot::MAV_AUTOPILOT_INVALID {
                    return;
                }
                let vehicle_type = format!("{:?}", hb.mavtype);
                let heartbeat = Heartbeat {
                    armed: hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED),
                    custom_mode: hb.custom_mode,
                    system_status: hb.system_status,
                    vehicle_type: vehicle_type
                        .strip_prefix("MAV_TYPE_")
                        .unwrap_or(&vehicle_type)
                        .to_string(),
                };
                self.state.write().await.heartbeat = Some(heartbeat);
            }

            MavMessage::GLOBAL_POSITION_INT(pos) => {
                let mut state = self.state.write().await;
                state.position = Some(Position {
                    lat: pos.lat as f64 / 1e7,
                    lon: pos.lon as f64 / 1e7,
                });
                state.relative_alt = Some(pos.relative_alt as f64 / 1000.0); // mm to m
                if state.heading.is_none() && pos.hdg != u16::MAX {
                    state.heading = Some(pos.hdg as f32 / 100.0); // cdeg to deg
                }
            }

            MavMessage::VFR_HUD(hud) => {
                let mut state = self.state.write().await;
                state.groundspeed = Some(hud.groundspeed);
                state.airspeed = Some(hud.airspeed);
                state.heading = Some(hud.heading as f32);
            }

            MavMessage::SYS_STATUS(sys) => {
                let battery = BatteryReading {
                    voltage: (sys.voltage_battery != u16::MAX)
                        .then(|| sys.voltage_battery as f32 / 1000.0), // mV to V
                    level: u8::try_from(sys.battery_remaining).ok(),
                };
                self.state.write().await.battery = Some(battery);
            }

            MavMessage::GPS_RAW_INT(gps) => {
                let reading = GpsReading {
                    fix_type: gps.fix_type as u8,
                    satellites: (gps.satellites_visible != u8::MAX).then_some(gps.satellites_visible),
                };
                self.state.write().await.gps = Some(reading);
            }

            MavMessage::ATTITUDE(att) => {
                self.state.write().await.attitude = Some(Attitude {
                    roll: att.roll,
                    pitch: att.pitch,
                    yaw: att.yaw,
                });
            }

            MavMessage::EKF_STATUS_REPORT(ekf) => {
                self.state.write().await.ekf_flags = Some(ekf.flags.bits() as u32);
            }

            MavMessage::STATUSTEXT(text) => {
                let text_str = String::from_utf8_lossy(&text.text);
                let text_str = text_str.trim_end_matches('\0');
                let severity = text.severity as u8;
                match severity {
                    0..=3 => error!(severity = severity_to_string(severity), "[FC] {}", text_str),
                    4 => warn!("[FC] {}", text_str),
                    5 | 6 => info!("[FC] {}", text_str),
                    _ => debug!(severity = severity_to_string(severity), "[FC] {}", text_str),
                }
            }

            _ => {
                // Other messages we don't process
            }
        }
    }

    /// Record that the link is gone; later reads fail with `reason`
    pub async fn mark_lost(&self, reason: impl Into<String>) {
        let mut state = self.state.write().await;
        if state.lost.is_none() {
            state.lost = Some(reason.into());
        }
    }

    async fn check_alive(&self) -> Result<()> {
        if let Some(reason) = &self.state.read().await.lost {
            bail!("link lost: {}", reason);
        }
        Ok(())
    }

    /// An autopilot heartbeat has been received
    pub async fn has_heartbeat(&self) -> Result<bool> {
        self.check_alive().await?;
        Ok(self.state.read().await.heartbeat.is_some())
    }

    /// Heartbeat seen, past boot, a GPS fix and (when reported) a usable EKF
    pub async fn is_armable(&self) -> Result<bool> {
        self.check_alive().await?;
        let state = self.state.read().await;
        let Some(hb) = &state.heartbeat else {
            return Ok(false);
        };
        let booted = !matches!(
            hb.system_status,
            MavState::MAV_STATE_UNINIT | MavState::MAV_STATE_BOOT | MavState::MAV_STATE_CALIBRATING
        );
        let gps_ok = state
            .gps
            .map(|gps| gps.fix_type > MIN_ARMABLE_FIX)
            .unwrap_or(false);
        let ekf_ok = state
            .ekf_flags
            .map(|flags| flags & EKF_PRED_POS_HORIZ_ABS != 0)
            .unwrap_or(true);
        Ok(booted && gps_ok && ekf_ok)
    }

    pub async fn is_armed(&self) -> Result<bool> {
        self.check_alive().await?;
        Ok(self
            .state
            .read()
            .await
            .heartbeat
            .as_ref()
            .map(|hb| hb.armed)
            .unwrap_or(false))
    }

    pub async fn mode(&self) -> Result<String> {
        self.check_alive().await?;
        Ok(self
            .state
            .read()
            .await
            .heartbeat
            .as_ref()
            .map(|hb| mode_to_string(hb.custom_mode))
            .unwrap_or_default())
    }

    pub async fn vehicle_type(&self) -> Option<String> {
        self.state
            .read()
            .await
            .heartbeat
            .as_ref()
            .map(|hb| hb.vehicle_type.clone())
    }

    /// Snapshot of every sub-reading received so far
    pub async fn reading(&self) -> Result<LinkReading> {
        self.check_alive().await?;
        let state = self.state.read().await;
        let (armed, mode) = match &state.heartbeat {
            Some(hb) => (hb.armed, mode_to_string(hb.custom_mode)),
            None => (false, String::new()),
        };
        Ok(LinkReading {
            armed,
            mode,
            position: state.position,
            relative_alt: state.relative_alt,
            groundspeed: state.groundspeed,
            airspeed: state.airspeed,
            heading: state.heading,
            battery: state.battery,
            gps: state.gps,
            attitude: state.attitude,
        })
    }
}

/// Convert MAVLink severity to string
fn severity_to_string(severity: u8) -> &'static str {
    match severity {
        0 => "EMERGENCY",
        1 => "ALERT",
        2 => "CRITICAL",
        3 => "ERROR",
        4 => "WARNING",
        5 => "NOTICE",
        6 => "INFO",
        7 => "DEBUG",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::ardupilotmega::{
        EkfStatusFlags, GpsFixType, MavType, ATTITUDE_DATA, EKF_STATUS_REPORT_DATA,
        GLOBAL_POSITION_INT_DATA, GPS_RAW_INT_DATA, HEARTBEAT_DATA, SYS_STATUS_DATA,
        VFR_HUD_DATA,
    };

    fn heartbeat(autopilot: MavAutopilot, status: MavState, armed: bool, custom_mode: u32) -> MavMessage {
        let base_mode = if armed {
            MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED | MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED
        } else {
            MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED
        };
        MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode,
            mavtype: MavType::MAV_TYPE_QUADROTOR,
            autopilot,
            base_mode,
            system_status: status,
            mavlink_version: 3,
        })
    }

    fn gps_fix(fix_type: GpsFixType) -> MavMessage {
        MavMessage::GPS_RAW_INT(GPS_RAW_INT_DATA {
            fix_type,
            satellites_visible: 12,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_telemetry_reader_creation() {
        let reader = TelemetryReader::new();
        assert!(!reader.has_heartbeat().await.unwrap());
        assert!(!reader.is_armed().await.unwrap());
        assert!(!reader.is_armable().await.unwrap());
        assert_eq!(reader.reading().await.unwrap(), LinkReading::default());
    }

    #[tokio::test]
    async fn test_heartbeat_decoding() {
        let reader = TelemetryReader::new();
        reader
            .process_message(&heartbeat(MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA, MavState::MAV_STATE_STANDBY, true, 4))
            .await;

        assert!(reader.is_armed().await.unwrap());
        assert_eq!(reader.mode().await.unwrap(), "GUIDED");
        assert_eq!(reader.vehicle_type().await.as_deref(), Some("QUADROTOR"));
    }

    #[tokio::test]
    async fn test_gcs_heartbeat_ignored() {
        let reader = TelemetryReader::new();
        reader
            .process_message(&heartbeat(MavAutopilot::MAV_AUTOPILOT_INVALID, MavState::MAV_STATE_ACTIVE, true, 9))
            .await;
        assert!(!reader.has_heartbeat().await.unwrap());
    }

    #[tokio::test]
    async fn test_armable_conditions() {
        let reader = TelemetryReader::new();
        reader
            .process_message(&heartbeat(MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA, MavState::MAV_STATE_BOOT, false, 0))
            .await;
        reader.process_message(&gps_fix(GpsFixType::GPS_FIX_TYPE_3D_FIX)).await;
        assert!(!reader.is_armable().await.unwrap(), "still booting");

        reader
            .process_message(&heartbeat(MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA, MavState::MAV_STATE_STANDBY, false, 0))
            .await;
        assert!(reader.is_armable().await.unwrap());

        reader.process_message(&gps_fix(GpsFixType::GPS_FIX_TYPE_NO_FIX)).await;
        assert!(!reader.is_armable().await.unwrap(), "no fix");

        reader.process_message(&gps_fix(GpsFixType::GPS_FIX_TYPE_3D_FIX)).await;
        reader
            .process_message(&MavMessage::EKF_STATUS_REPORT(EKF_STATUS_REPORT_DATA {
                flags: EkfStatusFlags::EKF_ATTITUDE,
                ..Default::default()
            }))
            .await;
        assert!(!reader.is_armable().await.unwrap(), "EKF not ready");

        reader
            .process_message(&MavMessage::EKF_STATUS_REPORT(EKF_STATUS_REPORT_DATA {
                flags: EkfStatusFlags::EKF_ATTITUDE | EkfStatusFlags::EKF_PRED_POS_HORIZ_ABS,
                ..Default::default()
            }))
            .await;
        assert!(reader.is_armable().await.unwrap());
    }

    #[tokio::test]
    async fn test_reading_units_and_sentinels() {
        let reader = TelemetryReader::new();
        reader
            .process_message(&MavMessage::GLOBAL_POSITION_INT(GLOBAL_POSITION_INT_DATA {
                lat: -353632610,
                lon: 1491652300,
                relative_alt: 12500,
                hdg: u16::MAX,
                ..Default::default()
            }))
            .await;
        reader
            .process_message(&MavMessage::SYS_STATUS(SYS_STATUS_DATA {
                voltage_battery: u16::MAX,
                battery_remaining: -1,
                ..Default::default()
            }))
            .await;
        reader
            .process_message(&MavMessage::ATTITUDE(ATTITUDE_DATA {
                roll: 0.1,
                pitch: -0.2,
                yaw: 1.5,
                ..Default::default()
            }))
            .await;

        let reading = reader.reading().await.unwrap();
        let pos = reading.position.unwrap();
        assert!((pos.lat + 35.363261).abs() < 1e-6);
        assert!((pos.lon - 149.16523).abs() < 1e-6);
        assert_eq!(reading.relative_alt, Some(12.5));
        assert_eq!(reading.heading, None);
        assert_eq!(
            reading.battery,
            Some(BatteryReading {
                voltage: None,
                level: None
            })
        );
        assert_eq!(reading.attitude.unwrap().yaw, 1.5);
        assert_eq!(reading.groundspeed, None);

        reader
            .process_message(&MavMessage::VFR_HUD(VFR_HUD_DATA {
                groundspeed: 4.5,
                airspeed: 5.0,
                heading: 270,
                ..Default::default()
            }))
            .await;
        let reading = reader.reading().await.unwrap();
        assert_eq!(reading.groundspeed, Some(4.5));
        assert_eq!(reading.heading, Some(270.0));
    }

    #[tokio::test]
    async fn test_lost_link_fails_reads() {
        let reader = TelemetryReader::new();
        reader.mark_lost("serial port unplugged").await;
        reader.mark_lost("second reason is ignored").await;

        let err = reader.reading().await.unwrap_err();
        assert_eq!(err.to_string(), "link lost: serial port unplugged");
        assert!(reader.is_armed().await.is_err());
    }

    #[test]
    fn test_severity_to_string() {
        assert_eq!(severity_to_string(0), "EMERGENCY");
        assert_eq!(severity_to_string(6), "INFO");
        assert_eq!(severity_to_string(42), "UNKNOWN");
    }
}
