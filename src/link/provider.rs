//! Backend selection

use super::sim::SimConnector;
use super::traits::LinkConnector;
use anyhow::Result;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Link backend chosen at process start
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// MAVLink autopilot (requires the `mavlink` feature)
    Mavlink,
    /// In-process simulated vehicle
    Sim,
    /// Mock mode: no link, every operation reports success
    Mock,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "mavlink") {
            Backend::Mavlink
        } else {
            Backend::Mock
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Mavlink => write!(f, "mavlink"),
            Backend::Sim => write!(f, "sim"),
            Backend::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mavlink" => Ok(Backend::Mavlink),
            "sim" => Ok(Backend::Sim),
            "mock" => Ok(Backend::Mock),
            other => Err(anyhow::anyhow!("unknown backend: {}", other)),
        }
    }
}

/// Process-wide link capability
#[derive(Clone)]
pub enum LinkProvider {
    /// Operations go through a real or simulated link
    Live(Arc<dyn LinkConnector>),
    /// Mock mode
    Mock,
}

impl LinkProvider {
    /// Resolve a backend to a provider.
    ///
    /// Asking for `mavlink` in a build without the link library degrades to
    /// mock mode.
    pub fn from_backend(backend: Backend) -> Self {
        match backend {
            Backend::Mavlink => Self::mavlink(),
            Backend::Sim => LinkProvider::Live(Arc::new(SimConnector::default())),
            Backend::Mock => LinkProvider::Mock,
        }
    }

    #[cfg(feature = "mavlink")]
    fn mavlink() -> Self {
        LinkProvider::Live(Arc::new(crate::mavlink::MavlinkConnector::default()))
    }

    #[cfg(not(feature = "mavlink"))]
    fn mavlink() -> Self {
        tracing::warn!("built without MAVLink support, falling back to mock mode");
        LinkProvider::Mock
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, LinkProvider::Mock)
    }

    pub fn name(&self) -> &'static str {
        match self {
            LinkProvider::Live(connector) => connector.name(),
            LinkProvider::Mock => "mock",
        }
    }

    pub(crate) fn connector(&self) -> Option<Arc<dyn LinkConnector>> {
        match self {
            LinkProvider::Live(connector) => Some(connector.clone()),
            LinkProvider::Mock => None,
        }
    }
}
