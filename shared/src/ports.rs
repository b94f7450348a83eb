use serde::{Deserialize, Serialize};

/// One serial/USB port found on the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortInfo {
    pub port: String,
    pub description: String,
    pub manufacturer: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl PortInfo {
    /// Port with only a device name (no USB metadata)
    pub fn named(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            description: "n/a".into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }
}
