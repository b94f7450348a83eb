//! MAVLink Command Construction
//!
//! Builds the MAVLink messages behind each vehicle operation.

use anyhow::{anyhow, Result};
use mavlink::ardupilotmega::{
    MavCmd, MavDataStream, MavFrame, MavMessage, COMMAND_LONG_DATA, MISSION_ITEM_INT_DATA,
    REQUEST_DATA_STREAM_DATA,
};
use std::fmt;
use std::str::FromStr;

/// Builds commands addressed to one autopilot
#[derive(Debug, Clone, Copy)]
pub struct MavCommandSender {
    target_system: u8,
    target_component: u8,
}

impl MavCommandSender {
    pub fn new(target_system: u8, target_component: u8) -> Self {
        Self {
            target_system,
            target_component,
        }
    }

    fn command_long(&self, command: MavCmd, params: [f32; 7]) -> MavMessage {
        MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            command,
            confirmation: 0,
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
        })
    }

    /// Arm (true) or disarm (false)
    pub fn arm_disarm(&self, arm: bool) -> MavMessage {
        let param1 = if arm { 1.0 } else { 0.0 };
        self.command_long(
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            [param1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    /// Take off to an altitude relative to home
    pub fn takeoff(&self, altitude_m: f32) -> MavMessage {
        self.command_long(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            [
                0.0,        // Minimum pitch
                0.0,        // Empty
                0.0,        // Empty
                f32::NAN,   // Yaw angle (NAN = current)
                0.0,        // Latitude (0 = current)
                0.0,        // Longitude (0 = current)
                altitude_m, // Altitude
            ],
        )
    }

    /// Switch to an ArduPilot custom mode
    pub fn set_mode(&self, mode: ArduPilotMode) -> MavMessage {
        self.command_long(
            MavCmd::MAV_CMD_DO_SET_MODE,
            [
                1.0, // MAV_MODE_FLAG_CUSTOM_MODE_ENABLED
                mode as u32 as f32,
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
            ],
        )
    }

    /// Guided-mode navigation target with altitude relative to home
    pub fn goto_position(&self, lat: f64, lon: f64, altitude_m: f32) -> MavMessage {
        MavMessage::MISSION_ITEM_INT(MISSION_ITEM_INT_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            seq: 0,
            frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            command: MavCmd::MAV_CMD_NAV_WAYPOINT,
            current: 2, // Guided mode waypoint
            autocontinue: 0,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            x: (lat * 1e7).round() as i32,
            y: (lon * 1e7).round() as i32,
            z: altitude_m,
        })
    }

    /// Ask the autopilot to stream all telemetry at `rate_hz`
    pub fn request_data_streams(&self, rate_hz: u16) -> MavMessage {
        MavMessage::REQUEST_DATA_STREAM(REQUEST_DATA_STREAM_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            req_stream_id: MavDataStream::MAV_DATA_STREAM_ALL as u8,
            req_message_rate: rate_hz,
            start_stop: 1,
        })
    }
}

/// ArduPilot Copter flight modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ArduPilotMode {
    Stabilize = 0,
    Acro = 1,
    AltHold = 2,
    Auto = 3,
    Guided = 4,
    Loiter = 5,
    Rtl = 6,
    Circle = 7,
    Land = 9,
    Drift = 11,
    Sport = 13,
    Flip = 14,
    AutoTune = 15,
    PosHold = 16,
    Brake = 17,
    Throw = 18,
    AvoidAdsb = 19,
    GuidedNoGps = 20,
    SmartRtl = 21,
    FlowHold = 22,
    Follow = 23,
    ZigZag = 24,
    SystemId = 25,
    HeliAutorotate = 26,
    AutoRtl = 27,
}

impl ArduPilotMode {
    const ALL: [ArduPilotMode; 25] = [
        ArduPilotMode::Stabilize,
        ArduPilotMode::Acro,
        ArduPilotMode::AltHold,
        ArduPilotMode::Auto,
        ArduPilotMode::Guided,
        ArduPilotMode::Loiter,
        ArduPilotMode::Rtl,
        ArduPilotMode::Circle,
        ArduPilotMode::Land,
        ArduPilotMode::Drift,
        ArduPilotMode::Sport,
        ArduPilotMode::Flip,
        ArduPilotMode::AutoTune,
        ArduPilotMode::PosHold,
        ArduPilotMode::Brake,
        ArduPilotMode::Throw,
        ArduPilotMode::AvoidAdsb,
        ArduPilotMode::GuidedNoGps,
        ArduPilotMode::SmartRtl,
        ArduPilotMode::FlowHold,
        ArduPilotMode::Follow,
        ArduPilotMode::ZigZag,
        ArduPilotMode::SystemId,
        ArduPilotMode::HeliAutorotate,
        ArduPilotMode::AutoRtl,
    ];

    /// Name as reported by ground stations
    pub fn name(self) -> &'static str {
        match self {
            ArduPilotMode::Stabilize => "STABILIZE",
            ArduPilotMode::Acro => "ACRO",
            ArduPilotMode::AltHold => "ALT_HOLD",
            ArduPilotMode::Auto => "AUTO",
            ArduPilotMode::Guided => "GUIDED",
            ArduPilotMode::Loiter => "LOITER",
            ArduPilotMode::Rtl => "RTL",
            ArduPilotMode::Circle => "CIRCLE",
            ArduPilotMode::Land => "LAND",
            ArduPilotMode::Drift => "DRIFT",
            ArduPilotMode::Sport => "SPORT",
            ArduPilotMode::Flip => "FLIP",
            ArduPilotMode::AutoTune => "AUTOTUNE",
            ArduPilotMode::PosHold => "POSHOLD",
            ArduPilotMode::Brake => "BRAKE",
            ArduPilotMode::Throw => "THROW",
            ArduPilotMode::AvoidAdsb => "AVOID_ADSB",
            ArduPilotMode::GuidedNoGps => "GUIDED_NOGPS",
            ArduPilotMode::SmartRtl => "SMART_RTL",
            ArduPilotMode::FlowHold => "FLOWHOLD",
            ArduPilotMode::Follow => "FOLLOW",
            ArduPilotMode::ZigZag => "ZIGZAG",
            ArduPilotMode::SystemId => "SYSTEMID",
            ArduPilotMode::HeliAutorotate => "AUTOROTATE",
            ArduPilotMode::AutoRtl => "AUTO_RTL",
        }
    }

    /// Mode for a HEARTBEAT custom_mode value
    pub fn from_custom_mode(custom_mode: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| *m as u32 == custom_mode)
    }
}

impl fmt::Display for ArduPilotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArduPilotMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("Unknown flight mode: {}", s))
    }
}

/// Convert an ArduPilot custom mode number to its name
pub fn mode_to_string(custom_mode: u32) -> String {
    match ArduPilotMode::from_custom_mode(custom_mode) {
        Some(mode) => mode.name().to_string(),
        None => format!("UNKNOWN({})", custom_mode),
    }
}
