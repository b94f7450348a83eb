//! HTTP routes over the persistent session

use crate::stream;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};
use utms_edge::{PortScanner, SessionManager};
use utms_shared::{defaults, CommandResult, FailureKind, TelemetryReport};

/// Shared state injected into the axum handlers
#[derive(Clone)]
pub struct AppState {
    /// The one session; every session route holds the lock for the whole operation
    pub manager: Arc<Mutex<SessionManager>>,
    /// Port enumeration, independent of the session lock
    pub scanner: Arc<dyn PortScanner>,
    pub default_port: String,
    pub default_baud: u32,
    /// Period of the WebSocket telemetry stream
    pub telemetry_interval: Duration,
    /// Flips to `true` when the server is shutting down
    pub shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectRequest {
    port: Option<String>,
    baud: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ModeRequest {
    mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TakeoffRequest {
    altitude: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GotoRequest {
    lat: f64,
    lon: f64,
    alt: Option<f32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/connect", post(connect))
        .route("/auto-connect", post(auto_connect))
        .route("/disconnect", post(disconnect))
        .route("/telemetry", get(telemetry))
        .route("/arm", post(arm))
        .route("/disarm", post(disarm))
        .route("/mode", post(set_mode))
        .route("/takeoff", post(takeoff))
        .route("/land", post(land))
        .route("/goto", post(goto))
        .route("/ports/scan", get(scan_ports))
        .route("/ws", get(stream::telemetry_ws))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn connect(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ConnectRequest = match parse_body(&body) {
        Ok(request) => request.unwrap_or_default(),
        Err(rejection) => return rejection,
    };
    let port = request.port.unwrap_or_else(|| state.default_port.clone());
    let baud = request.baud.unwrap_or(state.default_baud);

    info!(%port, baud, "POST /connect");
    let result = state.manager.lock().await.connect(&port, baud).await;
    respond(result)
}

async fn auto_connect(State(state): State<AppState>) -> Response {
    respond(state.manager.lock().await.auto_connect().await)
}

async fn disconnect(State(state): State<AppState>) -> Response {
    respond(state.manager.lock().await.disconnect().await)
}

async fn telemetry(State(state): State<AppState>) -> Response {
    let report = state.manager.lock().await.telemetry().await;
    let status = match report {
        TelemetryReport::Snapshot(_) => StatusCode::OK,
        TelemetryReport::Unavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(report)).into_response()
}

async fn arm(State(state): State<AppState>) -> Response {
    respond(state.manager.lock().await.arm().await)
}

async fn disarm(State(state): State<AppState>) -> Response {
    respond(state.manager.lock().await.disarm().await)
}

async fn set_mode(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ModeRequest = match parse_body(&body) {
        Ok(request) => request.unwrap_or_default(),
        Err(rejection) => return rejection,
    };
    let mode = request.mode.unwrap_or_else(|| defaults::MODE.to_string());
    respond(state.manager.lock().await.set_mode(&mode).await)
}

async fn takeoff(State(state): State<AppState>, body: Bytes) -> Response {
    let request: TakeoffRequest = match parse_body(&body) {
        Ok(request) => request.unwrap_or_default(),
        Err(rejection) => return rejection,
    };
    let altitude = request.altitude.unwrap_or(defaults::TAKEOFF_ALTITUDE_M);
    respond(state.manager.lock().await.takeoff(altitude).await)
}

async fn land(State(state): State<AppState>) -> Response {
    respond(state.manager.lock().await.land().await)
}

async fn goto(State(state): State<AppState>, body: Bytes) -> Response {
    let request: GotoRequest = match parse_body(&body) {
        Ok(Some(request)) => request,
        Ok(None) => return bad_request("lat and lon are required"),
        Err(rejection) => return rejection,
    };
    let alt = request.alt.unwrap_or(defaults::GOTO_ALTITUDE_M);
    respond(
        state
            .manager
            .lock()
            .await
            .goto(request.lat, request.lon, alt)
            .await,
    )
}

async fn scan_ports(State(state): State<AppState>) -> Response {
    let scanner = state.scanner.clone();
    match tokio::task::spawn_blocking(move || utms_edge::ports::scan_ports(scanner.as_ref())).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => respond(CommandResult::failed(FailureKind::Connection, e.to_string())),
    }
}

/// An empty body means "all defaults"
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<Option<T>, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body).map(Some).map_err(|err| {
        debug!(error = %err, "rejecting request body");
        bad_request(&format!("invalid request body: {}", err))
    })
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "message": message})),
    )
        .into_response()
}

fn respond(result: CommandResult) -> Response {
    let status = match (result.success, result.failure) {
        (true, _) => StatusCode::OK,
        (false, Some(FailureKind::Precondition)) => StatusCode::BAD_REQUEST,
        (false, _) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(result)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;
    use utms_edge::link::{LinkProvider, SimConnector};
    use utms_edge::{FixedPorts, SessionConfig};

    fn test_state(provider: LinkProvider, ports: &[&str]) -> AppState {
        let scanner: Arc<dyn PortScanner> =
            Arc::new(FixedPorts::from_names(ports.iter().copied()));
        let manager = SessionManager::new(provider, scanner.clone(), SessionConfig::fast());
        let (_tx, shutdown) = watch::channel(false);
        AppState {
            manager: Arc::new(Mutex::new(manager)),
            scanner,
            default_port: defaults::SERVER_PORT.into(),
            default_baud: defaults::SERVER_BAUD,
            telemetry_interval: Duration::from_millis(10),
            shutdown,
        }
    }

    fn sim_state() -> AppState {
        test_state(LinkProvider::Live(Arc::new(SimConnector::default())), &["COM6"])
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(sim_state());
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_connect_defaults() {
        let app = router(sim_state());
        let (status, body) = call(&app, "POST", "/connect", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Connected to COM6 at 9600 baud");

        let (status, body) = call(
            &app,
            "POST",
            "/connect",
            Some(json!({"port": "/dev/ttyUSB0", "baud": 57600})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["port"], "/dev/ttyUSB0");

        let (_, body) = call(&app, "GET", "/telemetry", None).await;
        assert_eq!(body["connected"], true);
        assert_eq!(body["port"], "/dev/ttyUSB0");
    }

    #[tokio::test]
    async fn test_precondition_is_bad_request() {
        let app = router(sim_state());
        let (status, body) = call(&app, "POST", "/arm", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": false, "message": "Not connected"}));
    }

    #[tokio::test]
    async fn test_connection_failure_is_server_error() {
        let state = test_state(
            LinkProvider::Live(Arc::new(SimConnector::default().reject_all())),
            &["COM6"],
        );
        let app = router(state);
        let (status, body) = call(&app, "POST", "/connect", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "no heartbeat from COM6 at 9600 baud");

        let (status, body) = call(&app, "POST", "/auto-connect", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Could not connect to any port");
    }

    #[tokio::test]
    async fn test_flight_over_http() {
        let app = router(sim_state());
        call(&app, "POST", "/connect", Some(json!({"port": "PORT-A", "baud": 57600}))).await;

        let (status, body) = call(&app, "POST", "/arm", None).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["message"], "Armed");

        let (_, body) = call(&app, "POST", "/takeoff", Some(json!({"altitude": 15}))).await;
        assert_eq!(body["message"], "Taking off to 15m");

        let (_, body) = call(&app, "POST", "/goto", Some(json!({"lat": 1.5, "lon": 2.5}))).await;
        assert_eq!(body["message"], "Going to 1.5, 2.5 @ 10m");

        let (_, body) = call(&app, "POST", "/mode", Some(json!({"mode": "RTL"}))).await;
        assert_eq!(body["message"], "Mode changed to RTL");

        let (status, _) = call(&app, "POST", "/land", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, "GET", "/telemetry", None).await;
        assert_eq!(body["mode"], "LAND");

        let (status, body) = call(&app, "POST", "/disconnect", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Disconnected");
        let (_, body) = call(&app, "GET", "/telemetry", None).await;
        assert_eq!(body["connected"], false);
        assert_eq!(body["lat"], 28.6139);
    }

    #[tokio::test]
    async fn test_malformed_bodies() {
        let app = router(sim_state());
        let (status, body) = call(&app, "POST", "/goto", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "lat and lon are required");

        let (status, _) = call(&app, "POST", "/takeoff", Some(json!({"altitude": "high"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scan_ports() {
        let app = router(sim_state());
        let (status, body) = call(&app, "GET", "/ports/scan", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["ports"][0]["port"], "COM6");

        let app = router(test_state(LinkProvider::Mock, &[]));
        let (status, body) = call(&app, "GET", "/ports/scan", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "No COM ports found");
    }

    #[tokio::test]
    async fn test_mock_server() {
        let app = router(test_state(LinkProvider::Mock, &[]));
        let (status, body) = call(&app, "POST", "/arm", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Armed (MOCK MODE)");

        let (_, body) = call(&app, "POST", "/auto-connect", None).await;
        assert_eq!(body["port"], "COM3");
    }
}
