//! The single live session

use crate::link::VehicleLink;
use utms_shared::SessionError;

/// At most one open vehicle link plus where it was opened
///
/// In mock mode the session is connected without a link.
#[derive(Default)]
pub struct Session {
    link: Option<Box<dyn VehicleLink>>,
    connected: bool,
    port: Option<String>,
    baud: Option<u32>,
}

impl Session {
    /// Install a freshly opened link; the previous one must already be taken
    pub fn open(&mut self, link: Box<dyn VehicleLink>, port: &str, baud: u32) {
        self.link = Some(link);
        self.mark_connected(port, baud);
    }

    /// Connected state without a link (mock mode)
    pub fn mark_connected(&mut self, port: &str, baud: u32) {
        self.connected = true;
        self.port = Some(port.to_string());
        self.baud = Some(baud);
    }

    /// Clear all state and hand back the link for closing
    pub fn take(&mut self) -> Option<Box<dyn VehicleLink>> {
        self.connected = false;
        self.port = None;
        self.baud = None;
        self.link.take()
    }

    /// The open link, or `NotConnected`
    pub fn link(&self) -> Result<&dyn VehicleLink, SessionError> {
        match (&self.link, self.connected) {
            (Some(link), true) => Ok(link.as_ref()),
            _ => Err(SessionError::NotConnected),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn baud(&self) -> Option<u32> {
        self.baud
    }
}
