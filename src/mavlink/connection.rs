//! Flight Controller Connection
//!
//! Opens MAVLink links to ArduPilot autopilots over serial, UDP or TCP and
//! exposes them as [`VehicleLink`]s.

use super::commands::{ArduPilotMode, MavCommandSender};
use super::telemetry::TelemetryReader;
use crate::link::{LinkConnector, LinkReading, VehicleLink};
use crate::wait::{wait_until, WaitPolicy};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mavlink::ardupilotmega::{
    MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA,
};
use mavlink::error::MessageReadError;
use mavlink::{AsyncMavConnection, MavHeader};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type SharedConnection = Arc<dyn AsyncMavConnection<MavMessage> + Send + Sync>;

/// Aborted link tasks that may still hold the port
type Retired = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Where the autopilot is reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEndpoint {
    /// Serial port connection (e.g., "/dev/ttyACM0" or "COM3")
    Serial { port: String, baud: u32 },
    /// Fully qualified MAVLink address (e.g., "udpin:0.0.0.0:14550")
    Address(String),
}

impl LinkEndpoint {
    const PREFIXES: [&'static str; 5] = ["udpin:", "udpout:", "tcpin:", "tcpout:", "serial:"];

    /// Interpret a user supplied port string.
    ///
    /// Prefixed addresses pass through, a bare `host:port` listens on UDP,
    /// anything else is a serial device opened at `baud`.
    pub fn parse(endpoint: &str, baud: u32) -> Self {
        let endpoint = endpoint.trim();
        if Self::PREFIXES.iter().any(|p| endpoint.starts_with(p)) {
            return Self::Address(endpoint.to_string());
        }
        if let Some((host, port)) = endpoint.rsplit_once(':') {
            if !host.is_empty() && port.parse::<u16>().is_ok() {
                return Self::Address(format!("udpin:{}", endpoint));
            }
        }
        Self::Serial {
            port: endpoint.to_string(),
            baud,
        }
    }

    /// Connection string understood by `mavlink::connect_async`
    pub fn address(&self) -> String {
        match self {
            Self::Serial { port, baud } => format!("serial:{}:{}", port, baud),
            Self::Address(address) => address.clone(),
        }
    }
}

/// Configuration for flight controller connections
#[derive(Debug, Clone)]
pub struct MavlinkConfig {
    /// System ID for this ground station
    pub system_id: u8,
    /// Component ID for this ground station
    pub component_id: u8,
    /// Target system ID (flight controller)
    pub target_system: u8,
    /// Target component ID (autopilot)
    pub target_component: u8,
    /// Requested telemetry rate for all data streams
    pub stream_rate_hz: u16,
    /// How often we announce ourselves to the autopilot
    pub heartbeat_interval: Duration,
    /// Limit for one outgoing message, including waiting for the port
    pub send_timeout: Duration,
}

impl Default for MavlinkConfig {
    fn default() -> Self {
        Self {
            system_id: 255,      // Ground station
            component_id: 190,   // MAV_COMP_ID_MISSIONPLANNER
            target_system: 1,    // Autopilot
            target_component: 1, // MAV_COMP_ID_AUTOPILOT1
            stream_rate_hz: 4,
            heartbeat_interval: Duration::from_secs(1),
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Opens MAVLink links
///
/// A link that is closed or dropped hands its aborted tasks back here; the
/// next `open` waits for them so the previous socket or serial port is
/// released first.
#[derive(Debug, Clone, Default)]
pub struct MavlinkConnector {
    config: MavlinkConfig,
    retired: Retired,
}

#[async_trait]
impl LinkConnector for MavlinkConnector {
    async fn open(&self, endpoint: &str, baud: u32) -> Result<Box<dyn VehicleLink>> {
        reap(&self.retired).await;

        let address = LinkEndpoint::parse(endpoint, baud).address();
        info!("[MAVLink] Connecting to {}", address);

        let conn = mavlink::connect_async::<MavMessage>(&address)
            .await
            .with_context(|| format!("failed to open {}", address))?;

        let link = MavlinkLink::start(Arc::from(conn), self.config.clone(), self.retired.clone());

        // Dropping this future drops `link`, which retires its tasks
        let telemetry = link.telemetry.clone();
        wait_until(&WaitPolicy::unbounded(Duration::from_millis(100)), || {
            let telemetry = telemetry.clone();
            async move { telemetry.has_heartbeat().await }
        })
        .await?;

        link.send(
            link.commands
                .request_data_streams(link.config.stream_rate_hz),
        )
        .await?;
        info!(
            "[MAVLink] Heartbeat from {} ({})",
            address,
            link.telemetry.vehicle_type().await.unwrap_or_default()
        );
        Ok(Box::new(link))
    }

    fn name(&self) -> &'static str {
        "mavlink"
    }
}

/// One open autopilot link
pub struct MavlinkLink {
    config: MavlinkConfig,
    connection: Mutex<Option<SharedConnection>>,
    commands: MavCommandSender,
    telemetry: TelemetryReader,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    retired: Retired,
}

impl MavlinkLink {
    fn start(connection: SharedConnection, config: MavlinkConfig, retired: Retired) -> Self {
        let telemetry = TelemetryReader::new();

        let reader = tokio::spawn(reader_loop(connection.clone(), telemetry.clone()));
        let heartbeat = tokio::spawn(heartbeat_loop(connection.clone(), config.clone()));

        Self {
            commands: MavCommandSender::new(config.target_system, config.target_component),
            config,
            connection: Mutex::new(Some(connection)),
            telemetry,
            tasks: Mutex::new(vec![reader, heartbeat]),
            retired,
        }
    }

    fn header(&self) -> MavHeader {
        // The connection stamps its own sequence number
        MavHeader {
            system_id: self.config.system_id,
            component_id: self.config.component_id,
            sequence: 0,
        }
    }

    async fn send(&self, msg: MavMessage) -> Result<()> {
        let connection = lock(&self.connection)
            .clone()
            .ok_or_else(|| anyhow!("link closed"))?;
        tokio::time::timeout(self.config.send_timeout, connection.send(&self.header(), &msg))
            .await
            .map_err(|_| anyhow!("send timed out"))?
            .map_err(|e| anyhow!("send failed: {}", e))?;
        Ok(())
    }

    /// Abort the link tasks and drop our handle on the connection
    fn shutdown(&self) {
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        for task in &tasks {
            task.abort();
        }
        lock(&self.retired).extend(tasks);
        lock(&self.connection).take();
    }
}

impl Drop for MavlinkLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl VehicleLink for MavlinkLink {
    async fn is_armable(&self) -> Result<bool> {
        self.telemetry.is_armable().await
    }

    async fn armed(&self) -> Result<bool> {
        self.telemetry.is_armed().await
    }

    async fn mode(&self) -> Result<String> {
        self.telemetry.mode().await
    }

    async fn set_mode(&self, name: &str) -> Result<()> {
        let mode: ArduPilotMode = name.parse()?;
        debug!("[MAVLink] Set mode {}", mode);
        self.send(self.commands.set_mode(mode)).await
    }

    async fn set_armed(&self, armed: bool) -> Result<()> {
        debug!("[MAVLink] {}", if armed { "Arm" } else { "Disarm" });
        self.send(self.commands.arm_disarm(armed)).await
    }

    async fn takeoff(&self, altitude_m: f32) -> Result<()> {
        self.send(self.commands.takeoff(altitude_m)).await
    }

    async fn goto(&self, lat: f64, lon: f64, altitude_m: f32) -> Result<()> {
        self.send(self.commands.goto_position(lat, lon, altitude_m))
            .await
    }

    async fn telemetry(&self) -> Result<LinkReading> {
        self.telemetry.reading().await
    }

    async fn vehicle_type(&self) -> Option<String> {
        self.telemetry.vehicle_type().await
    }

    async fn close(&self) -> Result<()> {
        self.shutdown();
        reap(&self.retired).await;
        self.telemetry.mark_lost("link closed").await;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wait until every retired task has dropped its connection handle
async fn reap(retired: &Retired) {
    let tasks = std::mem::take(&mut *lock(retired));
    for task in tasks {
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!("[MAVLink] Link task failed: {}", e);
            }
        }
    }
}

async fn reader_loop(connection: SharedConnection, telemetry: TelemetryReader) {
    loop {
        match connection.recv().await {
            Ok((_header, msg)) => telemetry.process_message(&msg).await,
            Err(e @ MessageReadError::Parse(_)) => {
                debug!("[MAVLink] Skipping frame: {}", e);
            }
            Err(e) => {
                warn!("[MAVLink] Connection lost: {}", e);
                telemetry.mark_lost(e.to_string()).await;
                break;
            }
        }
    }
    debug!("[MAVLink] Reader stopped");
}

async fn heartbeat_loop(connection: SharedConnection, config: MavlinkConfig) {
    let msg = MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GCS,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    });
    let header = MavHeader {
        system_id: config.system_id,
        component_id: config.component_id,
        sequence: 0,
    };

    let mut ticker = tokio::time::interval(config.heartbeat_interval);
    loop {
        ticker.tick().await;
        match tokio::time::timeout(config.send_timeout, connection.send(&header, &msg)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("[MAVLink] Heartbeat send failed: {}", e),
            Err(_) => debug!("[MAVLink] Heartbeat send timed out"),
        }
    }
}
