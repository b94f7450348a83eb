//! Serial/USB port enumeration

use anyhow::{Context, Result};
use serde_json::Value;
use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::{debug, warn};
use utms_shared::{CommandResult, FailureKind, PortInfo, SessionError};

/// Source of candidate ports for scanning and auto-connect
pub trait PortScanner: Send + Sync {
    fn scan(&self) -> Result<Vec<PortInfo>>;
}

/// Enumerates the ports present on this host
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortScanner;

impl PortScanner for SerialPortScanner {
    fn scan(&self) -> Result<Vec<PortInfo>> {
        let ports = tokio_serial::available_ports().context("enumerate serial ports")?;
        let ports: Vec<PortInfo> = ports.into_iter().map(describe).collect();
        for port in &ports {
            debug!(port = %port.port, description = %port.description, "found port");
        }
        Ok(ports)
    }
}

/// Fixed candidate list that replaces host enumeration
#[derive(Debug, Default, Clone)]
pub struct FixedPorts(pub Vec<PortInfo>);

impl FixedPorts {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(PortInfo::named).collect())
    }
}

impl PortScanner for FixedPorts {
    fn scan(&self) -> Result<Vec<PortInfo>> {
        Ok(self.0.clone())
    }
}

/// Scan and shape the `scan_ports` reply
///
/// An empty scan is a `success:false` result, not an error.
pub fn scan_ports(scanner: &dyn PortScanner) -> CommandResult {
    let ports = match scanner.scan() {
        Ok(ports) => ports,
        Err(e) => {
            warn!("port scan failed: {:#}", e);
            return CommandResult::failed(FailureKind::Connection, format!("{:#}", e))
                .with("ports", Value::Array(Vec::new()));
        }
    };

    if ports.is_empty() {
        return CommandResult::from(SessionError::NoPorts).with("ports", Value::Array(Vec::new()));
    }

    match serde_json::to_value(&ports) {
        Ok(list) => CommandResult::ok(format!("Found {} port(s)", ports.len()))
            .with("ports", list)
            .with("count", ports.len()),
        Err(e) => CommandResult::from(SessionError::Link(e.to_string()))
            .with("ports", Value::Array(Vec::new())),
    }
}

fn describe(info: SerialPortInfo) -> PortInfo {
    match info.port_type {
        SerialPortType::UsbPort(usb) => PortInfo {
            description: usb
                .product
                .clone()
                .unwrap_or_else(|| "USB Serial Device".into()),
            port: info.port_name,
            manufacturer: usb.manufacturer,
            vid: Some(usb.vid),
            pid: Some(usb.pid),
        },
        SerialPortType::PciPort => PortInfo {
            description: "PCI Serial Port".into(),
            ..PortInfo::named(info.port_name)
        },
        SerialPortType::BluetoothPort => PortInfo {
            description: "Bluetooth Serial Port".into(),
            ..PortInfo::named(info.port_name)
        },
        SerialPortType::Unknown => PortInfo::named(info.port_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_serial::UsbPortInfo;

    #[test]
    fn test_describe_usb() {
        let info = SerialPortInfo {
            port_name: "/dev/ttyACM0".into(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x1209,
                pid: 0x5741,
                serial_number: None,
                manufacturer: Some("ArduPilot".into()),
                product: Some("CubeOrange".into()),
            }),
        };
        let port = describe(info);
        assert_eq!(port.port, "/dev/ttyACM0");
        assert_eq!(port.description, "CubeOrange");
        assert_eq!(port.manufacturer.as_deref(), Some("ArduPilot"));
        assert_eq!(port.vid, Some(0x1209));
        assert_eq!(port.pid, Some(0x5741));
    }

    #[test]
    fn test_describe_unknown() {
        let info = SerialPortInfo {
            port_name: "COM1".into(),
            port_type: SerialPortType::Unknown,
        };
        let port = describe(info);
        assert_eq!(port, PortInfo::named("COM1"));
    }

    #[test]
    fn test_fixed_ports() {
        let scanner = FixedPorts::from_names(["COM3", "COM4"]);
        let ports = scanner.scan().unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[1].port, "COM4");
    }

    struct Broken;

    impl PortScanner for Broken {
        fn scan(&self) -> Result<Vec<PortInfo>> {
            anyhow::bail!("permission denied")
        }
    }

    #[test]
    fn test_scan_ports_reply() {
        let result = scan_ports(&FixedPorts::from_names(["COM3", "COM4"]));
        assert!(result.success);
        assert_eq!(result.field("count"), Some(&Value::from(2)));
        assert_eq!(result.field("ports").unwrap()[1]["port"], "COM4");
        assert_eq!(result.field("ports").unwrap()[0]["description"], "n/a");

        let empty = scan_ports(&FixedPorts::default());
        assert!(!empty.success);
        assert_eq!(empty.message, "No COM ports found");
        assert_eq!(empty.field("ports"), Some(&Value::Array(Vec::new())));

        let broken = scan_ports(&Broken);
        assert!(!broken.success);
        assert_eq!(broken.message, "permission denied");
        assert_eq!(empty.field("ports"), broken.field("ports"));
    }
}
