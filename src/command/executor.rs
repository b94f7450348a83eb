//! Command executor - dispatches a parsed command and shapes the reply

use super::{Command, CommandError};
use crate::session::SessionManager;
use serde_json::{json, Value};
use utms_shared::{CommandResult, TelemetryReport, COMMAND_NAMES};

/// Outcome of one CLI invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Command(CommandResult),
    Telemetry(TelemetryReport),
    Error(CommandError),
    /// The operation was cancelled before it finished
    Interrupted,
}

impl Reply {
    /// JSON object printed for this reply
    pub fn to_value(&self) -> Value {
        match self {
            Reply::Command(result) => {
                let mut value = serde_json::to_value(result).unwrap_or_else(|e| {
                    json!({"success": false, "message": e.to_string()})
                });
                if result.is_connection_failure() {
                    value["error"] = Value::String(result.message.clone());
                }
                value
            }
            Reply::Telemetry(report) => serde_json::to_value(report)
                .unwrap_or_else(|e| json!({"connected": false, "error": e.to_string()})),
            Reply::Error(err @ CommandError::Unknown(_)) => json!({
                "error": err.to_string(),
                "available_commands": COMMAND_NAMES,
            }),
            Reply::Error(err) => json!({"error": err.to_string()}),
            Reply::Interrupted => json!({"error": "interrupted"}),
        }
    }
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        Reply::Error(err)
    }
}

/// Run one command against the session
pub async fn execute(manager: &mut SessionManager, command: &Command) -> Reply {
    tracing::debug!(command = command.name(), "executing");
    let result = match command {
        Command::ScanPorts => manager.scan_ports(),
        Command::AutoConnect => manager.auto_connect().await,
        Command::Connect { port, baud } => manager.connect(port, *baud).await,
        Command::Disconnect => manager.disconnect().await,
        Command::Telemetry => return Reply::Telemetry(manager.telemetry().await),
        Command::Arm => manager.arm().await,
        Command::Disarm => manager.disarm().await,
        Command::Mode { name } => manager.set_mode(name).await,
        Command::Takeoff { altitude_m } => manager.takeoff(*altitude_m).await,
        Command::Land => manager.land().await,
        Command::Goto { lat, lon, alt_m } => manager.goto(*lat, *lon, *alt_m).await,
    };
    Reply::Command(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::link::{LinkProvider, SimConnector};
    use crate::ports::FixedPorts;
    use std::sync::Arc;

    fn manager(provider: LinkProvider) -> SessionManager {
        SessionManager::new(
            provider,
            Arc::new(FixedPorts::from_names(["COM4"])),
            SessionConfig::fast(),
        )
    }

    #[test]
    fn test_unknown_command_envelope() {
        let reply = Reply::from(CommandError::Unknown("hover".into()));
        let value = reply.to_value();
        assert_eq!(value["error"], "Unknown command: hover");
        assert_eq!(
            value["available_commands"],
            json!([
                "scan_ports", "auto_connect", "connect", "disconnect", "telemetry", "arm",
                "disarm", "mode", "takeoff", "land", "goto"
            ])
        );
    }

    #[test]
    fn test_argument_error_envelope() {
        let reply = Reply::from(CommandError::MissingArgument {
            command: "goto",
            argument: "lat",
        });
        assert_eq!(reply.to_value(), json!({"error": "goto: missing argument <lat>"}));
        assert_eq!(Reply::Interrupted.to_value(), json!({"error": "interrupted"}));
    }

    #[tokio::test]
    async fn test_connection_failure_carries_error() {
        let provider = LinkProvider::Live(Arc::new(SimConnector::default().reject_all()));
        let mut manager = manager(provider);

        let command = Command::parse("connect", &["COM4"]).unwrap();
        let value = execute(&mut manager, &command).await.to_value();
        assert_eq!(value["success"], false);
        assert_eq!(value["port"], "COM4");
        assert_eq!(value["error"], value["message"]);
    }

    #[tokio::test]
    async fn test_precondition_failure_has_no_error_field() {
        let provider = LinkProvider::Live(Arc::new(SimConnector::default()));
        let mut manager = manager(provider);

        let value = execute(&mut manager, &Command::Arm).await.to_value();
        assert_eq!(value, json!({"success": false, "message": "Not connected"}));
    }

    #[tokio::test]
    async fn test_mock_telemetry_reply() {
        let mut manager = manager(LinkProvider::Mock);
        execute(&mut manager, &Command::AutoConnect).await;

        let reply = execute(&mut manager, &Command::Telemetry).await;
        let value = reply.to_value();
        assert_eq!(value["connected"], true);
        assert_eq!(value["port"], "COM4");
        assert_eq!(value["mode"], "DISARMED");
    }
}
