//! Session configuration

use crate::wait::WaitPolicy;
use std::time::Duration;
use utms_shared::defaults;

/// Tunables for the vehicle session manager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Limit for an explicit `connect` to report ready
    pub connect_timeout: Duration,
    /// Limit for each port/baud probe during auto-connect
    pub probe_timeout: Duration,
    /// Baud rates tried by auto-connect, in priority order
    pub auto_connect_bauds: Vec<u32>,
    /// Wait for the vehicle to report armable
    pub armable_wait: WaitPolicy,
    /// Wait for a requested mode to be read back
    pub mode_wait: WaitPolicy,
    /// Wait for armed/disarmed to be read back
    pub arm_wait: WaitPolicy,
    /// Make `set_mode` wait for read-back like `arm` does
    pub verify_mode_change: bool,
    /// Coordinate reported while disconnected (lat, lon)
    pub fallback_position: (f64, f64),
    /// Port reported by mock auto-connect when the host has none
    pub default_port: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            auto_connect_bauds: defaults::AUTO_CONNECT_BAUDS.to_vec(),
            armable_wait: WaitPolicy::bounded(Duration::from_secs(30), Duration::from_secs(2)),
            mode_wait: WaitPolicy::bounded(Duration::from_secs(30), Duration::from_millis(500)),
            arm_wait: WaitPolicy::bounded(Duration::from_secs(30), Duration::from_millis(500)),
            verify_mode_change: false,
            fallback_position: defaults::FALLBACK_POSITION,
            default_port: defaults::CLI_PORT.into(),
        }
    }
}

impl SessionConfig {
    /// Short timeouts and fast polling, for simulated vehicles
    pub fn fast() -> Self {
        let quick = WaitPolicy::bounded(Duration::from_millis(200), Duration::from_millis(5));
        Self {
            connect_timeout: Duration::from_secs(1),
            probe_timeout: Duration::from_millis(200),
            armable_wait: quick,
            mode_wait: quick,
            arm_wait: quick,
            ..Default::default()
        }
    }
}
