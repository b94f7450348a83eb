//! Session manager: the command surface over a single vehicle session

use super::state::Session;
use crate::config::SessionConfig;
use crate::link::{LinkConnector, LinkProvider, LinkReading, VehicleLink};
use crate::ports::PortScanner;
use crate::wait::{wait_until, WaitPolicy};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use utms_shared::{
    defaults, CommandResult, PortInfo, SessionError, TelemetryReport,
    TelemetrySnapshot, MOCK_TAG,
};

/// Owns the session and runs every vehicle operation against it
///
/// Operations never fail past this boundary: errors come back as a
/// `success:false` [`CommandResult`] (or an unavailable [`TelemetryReport`]).
/// Callers serialize access themselves, e.g. behind a mutex.
pub struct SessionManager {
    provider: LinkProvider,
    scanner: Arc<dyn PortScanner>,
    config: SessionConfig,
    session: Session,
}

impl SessionManager {
    pub fn new(provider: LinkProvider, scanner: Arc<dyn PortScanner>, config: SessionConfig) -> Self {
        info!(backend = provider.name(), "session manager ready");
        Self {
            provider,
            scanner,
            config,
            session: Session::default(),
        }
    }

    pub fn is_mock(&self) -> bool {
        self.provider.is_mock()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn port(&self) -> Option<&str> {
        self.session.port()
    }

    /// Enumerate candidate ports
    pub fn scan_ports(&self) -> CommandResult {
        crate::ports::scan_ports(self.scanner.as_ref())
    }

    /// Open a link to `port`, replacing any existing session
    pub async fn connect(&mut self, port: &str, baud: u32) -> CommandResult {
        self.close_session().await;

        let Some(connector) = self.provider.connector() else {
            self.session.mark_connected(port, baud);
            return mock(format_args!("Connected to {} at {} baud", port, baud))
                .with("port", port)
                .with("baud", baud);
        };

        info!(port, baud, "connecting");
        match open_link(connector.as_ref(), port, baud, self.config.connect_timeout).await {
            Ok(link) => {
                self.session.open(link, port, baud);
                info!(port, baud, "connected");
                CommandResult::ok(format!("Connected to {} at {} baud", port, baud))
                    .with("port", port)
                    .with("baud", baud)
            }
            Err(e) => {
                warn!(port, baud, "connect failed: {}", e);
                CommandResult::from(e).with("port", port)
            }
        }
    }

    /// Sweep every scanned port at each auto-connect baud; first success wins
    pub async fn auto_connect(&mut self) -> CommandResult {
        self.close_session().await;

        let scanned = self.scanner.scan();
        let Some(connector) = self.provider.connector() else {
            let port = scanned
                .ok()
                .and_then(|ports| ports.into_iter().next())
                .map(|info| info.port)
                .unwrap_or_else(|| self.config.default_port.clone());
            let baud = self
                .config
                .auto_connect_bauds
                .first()
                .copied()
                .unwrap_or(defaults::CLI_BAUD);
            self.session.mark_connected(&port, baud);
            return mock(format_args!("Auto-connected to {}", port))
                .with("port", port)
                .with("baud", baud);
        };

        match self.sweep(connector.as_ref(), scanned).await {
            Ok(result) => result,
            Err(e) => {
                warn!("auto-connect failed: {}", e);
                e.into()
            }
        }
    }

    async fn sweep(
        &mut self,
        connector: &dyn LinkConnector,
        scanned: anyhow::Result<Vec<PortInfo>>,
    ) -> Result<CommandResult, SessionError> {
        let ports = scanned.map_err(|e| SessionError::Connection(format!("{:#}", e)))?;
        if ports.is_empty() {
            return Err(SessionError::NoPorts);
        }

        for candidate in &ports {
            for &baud in &self.config.auto_connect_bauds {
                info!("Trying {} at {} baud...", candidate.port, baud);
                match open_link(connector, &candidate.port, baud, self.config.probe_timeout).await {
                    Ok(link) => {
                        let vehicle_type = link.vehicle_type().await;
                        self.session.open(link, &candidate.port, baud);
                        info!(port = %candidate.port, baud, "auto-connected");
                        return Ok(CommandResult::ok(format!("Auto-connected to {}", candidate.port))
                            .with("port", candidate.port.as_str())
                            .with("baud", baud)
                            .with(
                                "vehicle_type",
                                vehicle_type.unwrap_or_else(|| "Unknown".into()),
                            ));
                    }
                    Err(e) => debug!(port = %candidate.port, baud, "probe failed: {}", e),
                }
            }
        }
        Err(SessionError::NoWorkingPort)
    }

    /// Close the session; always succeeds
    pub async fn disconnect(&mut self) -> CommandResult {
        self.close_session().await;
        if self.is_mock() {
            mock("Disconnected")
        } else {
            CommandResult::ok("Disconnected")
        }
    }

    /// Release the session before shutdown
    pub async fn close(&mut self) {
        self.close_session().await;
    }

    async fn close_session(&mut self) {
        let port = self.session.port().unwrap_or_default().to_string();
        let baud = self.session.baud().unwrap_or_default();
        if let Some(link) = self.session.take() {
            if let Err(e) = link.close().await {
                warn!("error closing link: {:#}", e);
            }
            info!("session on {} at {} baud closed", port, baud);
        }
    }

    /// Read every telemetry field; missing sub-readings are zero
    pub async fn telemetry(&self) -> TelemetryReport {
        let port = self.session.port().map(str::to_string);

        if self.is_mock() {
            let mut snapshot = self.fallback_snapshot(port);
            snapshot.connected = self.session.is_connected();
            return TelemetryReport::Snapshot(snapshot);
        }

        let Ok(link) = self.session.link() else {
            return TelemetryReport::Snapshot(self.fallback_snapshot(None));
        };
        match link.telemetry().await {
            Ok(reading) => TelemetryReport::Snapshot(live_snapshot(reading, port)),
            Err(e) => {
                warn!("telemetry read failed: {:#}", e);
                TelemetryReport::unavailable(format!("{:#}", e))
            }
        }
    }

    fn fallback_snapshot(&self, port: Option<String>) -> TelemetrySnapshot {
        let (lat, lon) = self.config.fallback_position;
        TelemetrySnapshot::fallback(lat, lon, port)
    }

    /// Wait for armable, switch to GUIDED, arm; no rollback if a step fails
    pub async fn arm(&self) -> CommandResult {
        if self.is_mock() {
            return mock("Armed");
        }
        self.arm_inner().await.unwrap_or_else(CommandResult::from)
    }

    async fn arm_inner(&self) -> Result<CommandResult, SessionError> {
        let link = self.session.link()?;

        info!("waiting for vehicle to become armable");
        let armable = wait_until(&self.config.armable_wait, move || async move {
            link.is_armable().await
        })
        .await
        .map_err(link_error)?;
        if !armable {
            return Err(SessionError::NotArmable);
        }

        link.set_mode(defaults::MODE).await.map_err(link_error)?;
        self.wait_for_mode(link, defaults::MODE).await?;

        link.set_armed(true).await.map_err(link_error)?;
        wait_for_armed(link, &self.config.arm_wait, true).await?;

        info!("armed");
        Ok(CommandResult::ok("Armed"))
    }

    pub async fn disarm(&self) -> CommandResult {
        if self.is_mock() {
            return mock("Disarmed");
        }
        self.disarm_inner().await.unwrap_or_else(CommandResult::from)
    }

    async fn disarm_inner(&self) -> Result<CommandResult, SessionError> {
        let link = self.session.link()?;
        link.set_armed(false).await.map_err(link_error)?;
        wait_for_armed(link, &self.config.arm_wait, false).await?;
        info!("disarmed");
        Ok(CommandResult::ok("Disarmed"))
    }

    /// Request a flight mode; read-back only with `verify_mode_change`
    pub async fn set_mode(&self, name: &str) -> CommandResult {
        if self.is_mock() {
            return mock(format_args!("Mode changed to {}", name));
        }
        self.set_mode_inner(name)
            .await
            .unwrap_or_else(CommandResult::from)
    }

    async fn set_mode_inner(&self, name: &str) -> Result<CommandResult, SessionError> {
        let link = self.session.link()?;
        link.set_mode(name).await.map_err(link_error)?;
        if self.config.verify_mode_change {
            self.wait_for_mode(link, name).await?;
        }
        Ok(CommandResult::ok(format!("Mode changed to {}", name)))
    }

    async fn wait_for_mode(&self, link: &dyn VehicleLink, mode: &str) -> Result<(), SessionError> {
        let reached = wait_until(&self.config.mode_wait, move || async move {
            link.mode()
                .await
                .map(|current| current.eq_ignore_ascii_case(mode))
        })
        .await
        .map_err(link_error)?;

        if reached {
            Ok(())
        } else {
            Err(SessionError::Timeout(format!("mode {}", mode)))
        }
    }

    /// Fire-and-forget takeoff; needs an armed vehicle
    pub async fn takeoff(&self, altitude_m: f32) -> CommandResult {
        if self.is_mock() {
            return mock(format_args!("Taking off to {}m", altitude_m));
        }
        self.takeoff_inner(altitude_m)
            .await
            .unwrap_or_else(CommandResult::from)
    }

    async fn takeoff_inner(&self, altitude_m: f32) -> Result<CommandResult, SessionError> {
        let link = self.session.link()?;
        if !link.armed().await.map_err(link_error)? {
            return Err(SessionError::NotArmed);
        }
        link.takeoff(altitude_m).await.map_err(link_error)?;
        info!(altitude_m, "takeoff commanded");
        Ok(CommandResult::ok(format!("Taking off to {}m", altitude_m)))
    }

    /// Switch to LAND; armed state is not checked
    pub async fn land(&self) -> CommandResult {
        if self.is_mock() {
            return mock("Landing");
        }
        self.land_inner().await.unwrap_or_else(CommandResult::from)
    }

    async fn land_inner(&self) -> Result<CommandResult, SessionError> {
        let link = self.session.link()?;
        link.set_mode("LAND").await.map_err(link_error)?;
        info!("landing");
        Ok(CommandResult::ok("Landing"))
    }

    /// Fire-and-forget navigation to a relative-altitude position
    pub async fn goto(&self, lat: f64, lon: f64, alt_m: f32) -> CommandResult {
        if self.is_mock() {
            return mock(format_args!("Going to {}, {} @ {}m", lat, lon, alt_m));
        }
        self.goto_inner(lat, lon, alt_m)
            .await
            .unwrap_or_else(CommandResult::from)
    }

    async fn goto_inner(&self, lat: f64, lon: f64, alt_m: f32) -> Result<CommandResult, SessionError> {
        let link = self.session.link()?;
        link.goto(lat, lon, alt_m).await.map_err(link_error)?;
        info!(lat, lon, alt_m, "goto commanded");
        Ok(CommandResult::ok(format!("Going to {}, {} @ {}m", lat, lon, alt_m)))
    }
}

/// Open a link, bounded by `limit`; a timed-out attempt is dropped
async fn open_link(
    connector: &dyn LinkConnector,
    port: &str,
    baud: u32,
    limit: Duration,
) -> Result<Box<dyn VehicleLink>, SessionError> {
    match tokio::time::timeout(limit, connector.open(port, baud)).await {
        Ok(Ok(link)) => Ok(link),
        Ok(Err(e)) => Err(SessionError::Connection(format!("{:#}", e))),
        Err(_) => Err(SessionError::Connection(format!(
            "Timed out waiting for {} at {} baud",
            port, baud
        ))),
    }
}

async fn wait_for_armed(
    link: &dyn VehicleLink,
    policy: &WaitPolicy,
    target: bool,
) -> Result<(), SessionError> {
    let reached = wait_until(policy, move || async move {
        link.armed().await.map(|armed| armed == target)
    })
    .await
    .map_err(link_error)?;

    match (reached, target) {
        (true, _) => Ok(()),
        (false, true) => Err(SessionError::Timeout("arming".into())),
        (false, false) => Err(SessionError::Timeout("disarming".into())),
    }
}

fn live_snapshot(reading: LinkReading, port: Option<String>) -> TelemetrySnapshot {
    let position = reading.position.unwrap_or_default();
    let battery = reading.battery.unwrap_or_default();
    let gps = reading.gps.unwrap_or_default();
    let attitude = reading.attitude.unwrap_or_default();

    TelemetrySnapshot {
        connected: true,
        armed: reading.armed,
        mode: reading.mode,
        lat: position.lat,
        lon: position.lon,
        alt: reading.relative_alt.unwrap_or(0.0),
        groundspeed: reading.groundspeed.unwrap_or(0.0),
        airspeed: reading.airspeed.unwrap_or(0.0),
        heading: reading.heading.unwrap_or(0.0),
        battery_voltage: battery.voltage.unwrap_or(0.0),
        battery_remaining: battery.level.unwrap_or(0),
        gps_fix: gps.fix_type,
        satellites: gps.satellites.unwrap_or(0),
        roll: attitude.roll,
        pitch: attitude.pitch,
        yaw: attitude.yaw,
        port,
    }
}

fn link_error(e: anyhow::Error) -> SessionError {
    SessionError::Link(format!("{:#}", e))
}

fn mock(message: impl Display) -> CommandResult {
    CommandResult::ok(format!("{}{}", message, MOCK_TAG))
}
