//! WebSocket telemetry stream

use crate::routes::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};
use utms_shared::codec::encode_line;

pub async fn telemetry_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| client_loop(socket, state))
}

/// One telemetry frame, read under the session lock
pub async fn next_frame(state: &AppState) -> Option<String> {
    let report = state.manager.lock().await.telemetry().await;
    match encode_line(&report) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(error = %err, "failed to encode telemetry frame");
            None
        }
    }
}

async fn client_loop(mut socket: WebSocket, state: AppState) {
    let mut ticker = interval(state.telemetry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut shutdown = state.shutdown.clone();
    debug!("telemetry stream opened");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(text) = next_frame(&state).await else {
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                let Some(Ok(message)) = message else {
                    break;
                };
                match message {
                    Message::Ping(payload) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = shutdown.changed() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }
    debug!("telemetry stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{watch, Mutex};
    use utms_edge::link::LinkProvider;
    use utms_edge::{FixedPorts, PortScanner, SessionConfig, SessionManager};

    #[tokio::test]
    async fn test_frame_tracks_session() {
        let scanner: Arc<dyn PortScanner> = Arc::new(FixedPorts::from_names(["COM6"]));
        let manager = SessionManager::new(LinkProvider::Mock, scanner.clone(), SessionConfig::fast());
        let (_tx, shutdown) = watch::channel(false);
        let state = AppState {
            manager: Arc::new(Mutex::new(manager)),
            scanner,
            default_port: "COM6".into(),
            default_baud: 9600,
            telemetry_interval: Duration::from_millis(10),
            shutdown,
        };

        let frame: Value = serde_json::from_str(&next_frame(&state).await.unwrap()).unwrap();
        assert_eq!(frame["connected"], false);

        state.manager.lock().await.connect("COM6", 9600).await;
        let frame: Value = serde_json::from_str(&next_frame(&state).await.unwrap()).unwrap();
        assert_eq!(frame["connected"], true);
        assert_eq!(frame["port"], "COM6");
        assert!(!next_frame(&state).await.unwrap().contains('\n'));
    }
}
