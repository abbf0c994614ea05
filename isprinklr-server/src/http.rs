//! HTTP control API.
//!
//! Routes:
//! - `POST /api/start` `{"zone": n, "minutes": m}`
//! - `POST /api/stop` `{"zone": n}`
//! - `GET /api/status`
//! - `GET /metrics`
//! - `GET /health`

use crate::error::ServerError;
use crate::handler::ZoneLimits;
use crate::link::LinkStatus;
use crate::metrics::Metrics;
use crate::network::NetworkMonitor;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use isprinklr_core::ZoneActuator;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Shared state behind the API.
pub struct ApiState {
    actuator: Arc<dyn ZoneActuator>,
    limits: ZoneLimits,
    started: Instant,
    metrics: Option<Arc<Metrics>>,
    network: Option<Arc<NetworkMonitor>>,
    link: Option<Arc<LinkStatus>>,
}

impl ApiState {
    pub fn new(actuator: Arc<dyn ZoneActuator>, limits: ZoneLimits) -> Self {
        Self {
            actuator,
            limits,
            started: Instant::now(),
            metrics: None,
            network: None,
            link: None,
        }
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_network(mut self, network: Arc<NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_link(mut self, link: Arc<LinkStatus>) -> Self {
        self.link = Some(link);
        self
    }
}

/// Binds `addr` and serves the API until shutdown.
pub async fn run_http_server(
    addr: SocketAddr,
    state: Arc<ApiState>,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// Serves the API on an already bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ApiState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!("HTTP API listening on http://{}", listener.local_addr()?);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                tracing::debug!("HTTP connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("HTTP accept error: {}", e);
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("HTTP API shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<ApiState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    Ok(route(&parts.method, parts.uri.path(), &body, &state))
}

/// Routes a buffered request.
pub fn route(method: &Method, path: &str, body: &[u8], state: &ApiState) -> Response<Full<Bytes>> {
    let response = match (method, path) {
        (&Method::POST, "/api/start") => start(body, state),
        (&Method::POST, "/api/stop") => stop(body, state),
        (&Method::GET, "/api/status") => status(state),
        (&Method::GET, "/metrics") => metrics(state),
        (&Method::GET, "/health") => text(StatusCode::OK, "OK"),
        (_, "/api/start" | "/api/stop" | "/api/status" | "/metrics" | "/health") => {
            text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        }
        _ => text(StatusCode::NOT_FOUND, "Not Found"),
    };

    tracing::debug!("{} {} -> {}", method, path, response.status().as_u16());
    if let Some(ref metrics) = state.metrics {
        metrics
            .http_requests_total
            .with_label_values(&[route_label(path), response.status().as_str()])
            .inc();
    }
    response
}

fn route_label(path: &str) -> &'static str {
    match path {
        "/api/start" => "/api/start",
        "/api/stop" => "/api/stop",
        "/api/status" => "/api/status",
        "/metrics" => "/metrics",
        "/health" => "/health",
        _ => "other",
    }
}

fn start(body: &[u8], state: &ApiState) -> Response<Full<Bytes>> {
    let (zone, minutes) = match start_params(body, state.limits) {
        Ok(params) => params,
        Err(e) => return error_response(&e),
    };

    tracing::info!("API start zone {} for {} minutes", zone, minutes);
    let result = state.actuator.start_zone(zone, minutes);
    if let Some(ref metrics) = state.metrics {
        metrics.record_actuator_call("start", result.is_ok());
    }

    match result {
        Ok(()) => json_response(
            StatusCode::OK,
            json!({"status": "started", "zone": zone, "minutes": minutes}),
        ),
        Err(e) => {
            tracing::warn!("Error starting zone {}: {}", zone, e.hint());
            json_response(
                ServerError::from(e).status_code(),
                json!({"status": "error", "zone": zone, "minutes": minutes, "error": e.hint()}),
            )
        }
    }
}

fn stop(body: &[u8], state: &ApiState) -> Response<Full<Bytes>> {
    let zone = match stop_params(body, state.limits) {
        Ok(zone) => zone,
        Err(e) => return error_response(&e),
    };

    tracing::info!("API stop zone {}", zone);
    let result = state.actuator.stop_zone(zone);
    if let Some(ref metrics) = state.metrics {
        metrics.record_actuator_call("stop", result.is_ok());
    }

    match result {
        Ok(()) => json_response(StatusCode::OK, json!({"status": "stopped", "zone": zone})),
        Err(e) => {
            tracing::warn!("Error stopping zone {}: {}", zone, e.hint());
            json_response(
                ServerError::from(e).status_code(),
                json!({"status": "error", "zone": zone, "error": e.hint()}),
            )
        }
    }
}

/// Validates a start request, returning the zone and minutes.
fn start_params(body: &[u8], limits: ZoneLimits) -> Result<(u8, u8), ServerError> {
    let doc = parse_body(body)?;
    let (Some(zone), Some(minutes)) = (doc.get("zone"), doc.get("minutes")) else {
        return Err(ServerError::InvalidRequest(
            "Missing required parameters".to_string(),
        ));
    };
    let zone = check_zone(as_int(zone), limits)?;
    let minutes = as_int(minutes);
    if !limits.minutes_ok(minutes) {
        return Err(ServerError::InvalidRequest(format!(
            "Minutes must be between {} and {}",
            limits.min_minutes, limits.max_minutes
        )));
    }
    // Bounded by the u8 limits above.
    Ok((zone, minutes as u8))
}

fn stop_params(body: &[u8], limits: ZoneLimits) -> Result<u8, ServerError> {
    let doc = parse_body(body)?;
    let Some(zone) = doc.get("zone") else {
        return Err(ServerError::InvalidRequest(
            "Missing required parameter: zone".to_string(),
        ));
    };
    check_zone(as_int(zone), limits)
}

fn check_zone(zone: i64, limits: ZoneLimits) -> Result<u8, ServerError> {
    if !limits.zone_ok(zone) {
        return Err(ServerError::InvalidRequest(format!(
            "Zone must be between 1 and {}",
            limits.max_zone
        )));
    }
    Ok(zone as u8)
}

fn status(state: &ApiState) -> Response<Full<Bytes>> {
    let network = match state.network {
        Some(ref monitor) => serde_json::to_value(monitor.status()).unwrap_or(Value::Null),
        None => Value::Null,
    };
    let link = match state.link {
        Some(ref link) => link.to_json(),
        None => Value::Null,
    };
    json_response(
        StatusCode::OK,
        json!({
            "status": "ok",
            "uptime_ms": state.started.elapsed().as_millis() as u64,
            "version": env!("CARGO_PKG_VERSION"),
            "network": network,
            "link": link,
            "zones": state.actuator.running_zones(),
        }),
    )
}

fn metrics(state: &ApiState) -> Response<Full<Bytes>> {
    let Some(ref metrics) = state.metrics else {
        return text(StatusCode::NOT_FOUND, "Metrics disabled");
    };
    match metrics.encode() {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            response
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "Metrics encoding failed")
        }
    }
}

fn parse_body(body: &[u8]) -> Result<Value, ServerError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("JSON error: {}", e);
        ServerError::Json(e)
    })
}

/// Reads a JSON number as an integer. Non-numeric values read as 0 and fail
/// range checks.
fn as_int(value: &Value) -> i64 {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .unwrap_or(0)
}

fn error_response(error: &ServerError) -> Response<Full<Bytes>> {
    json_response(error.status_code(), json!({"error": error.to_string()}))
}

fn json_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use isprinklr_core::{ActuatorCall, SimulatedController};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn test_state() -> (Arc<SimulatedController>, Arc<Metrics>, ApiState) {
        let controller = Arc::new(SimulatedController::default());
        let metrics = Arc::new(Metrics::new().unwrap());
        let state =
            ApiState::new(controller.clone(), ZoneLimits::HTTP).with_metrics(metrics.clone());
        (controller, metrics, state)
    }

    async fn body_json(response: Response<Full<Bytes>>) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_start_zone() {
        let (controller, _, state) = test_state();
        let response = route(&Method::POST, "/api/start", br#"{"zone": 3, "minutes": 5}"#, &state);
        let (status, body) = body_json(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "started", "zone": 3, "minutes": 5}));
        assert_eq!(
            controller.calls(),
            vec![ActuatorCall::Start { zone: 3, minutes: 5 }]
        );
    }

    #[tokio::test]
    async fn test_start_validation_messages() {
        let (controller, _, state) = test_state();
        let cases: &[(&[u8], &str)] = &[
            (br#"{"zone": 3}"#, "Missing required parameters"),
            (br#"{"zone": 0, "minutes": 5}"#, "Zone must be between 1 and 20"),
            (br#"{"zone": 21, "minutes": 5}"#, "Zone must be between 1 and 20"),
            (br#"{"zone": 1, "minutes": -1}"#, "Minutes must be between 0 and 120"),
            (br#"{"zone": 1, "minutes": 121}"#, "Minutes must be between 0 and 120"),
        ];

        for (body, message) in cases {
            let (status, json) = body_json(route(&Method::POST, "/api/start", body, &state)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], *message);
        }
        assert!(controller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let (_, _, state) = test_state();
        let (status, json) =
            body_json(route(&Method::POST, "/api/start", b"{zone:", &state)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid JSON: "));
    }

    #[tokio::test]
    async fn test_zero_minutes_accepted() {
        let (controller, _, state) = test_state();
        controller.start_zone(4, 10).unwrap();
        let response = route(&Method::POST, "/api/start", br#"{"zone": 4, "minutes": 0}"#, &state);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(controller.running_zones().is_empty());
    }

    #[tokio::test]
    async fn test_actuator_error_is_500() {
        let (controller, _, state) = test_state();
        controller.set_busy(true);

        let (status, json) = body_json(route(
            &Method::POST,
            "/api/start",
            br#"{"zone": 2, "minutes": 10}"#,
            &state,
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json,
            json!({"status": "error", "zone": 2, "minutes": 10, "error": "controller busy"})
        );

        let (status, json) =
            body_json(route(&Method::POST, "/api/stop", br#"{"zone": 2}"#, &state)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "controller busy");
    }

    #[tokio::test]
    async fn test_stop_zone() {
        let (controller, _, state) = test_state();
        let (status, json) =
            body_json(route(&Method::POST, "/api/stop", br#"{"zone": 7}"#, &state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"status": "stopped", "zone": 7}));
        assert_eq!(controller.calls(), vec![ActuatorCall::Stop { zone: 7 }]);

        let (status, json) = body_json(route(&Method::POST, "/api/stop", b"{}", &state)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing required parameter: zone");

        let (status, json) =
            body_json(route(&Method::POST, "/api/stop", br#"{"zone": 21}"#, &state)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({"error": "Zone must be between 1 and 20"}));
        assert_eq!(controller.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_zones() {
        let (controller, _, state) = test_state();
        let monitor = Arc::new(
            NetworkMonitor::new(NetworkConfig::default())
                .unwrap()
                .with_probe(Box::new(|| None)),
        );
        let state = state
            .with_network(monitor)
            .with_link(Arc::new(LinkStatus::default()));
        controller.start_zone(5, 15).unwrap();

        let (status, json) = body_json(route(&Method::GET, "/api/status", b"", &state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["network"]["network_type"], "Disconnected");
        assert_eq!(json["link"]["session"]["state"], "disconnected");
        assert_eq!(json["zones"][0]["zone"], 5);
        assert_eq!(json["zones"][0]["minutes"], 15);
    }

    #[tokio::test]
    async fn test_routing_errors() {
        let (_, metrics, state) = test_state();
        assert_eq!(
            route(&Method::GET, "/api/start", b"", &state).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            route(&Method::GET, "/nope", b"", &state).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            route(&Method::GET, "/health", b"", &state).status(),
            StatusCode::OK
        );
        assert_eq!(
            metrics
                .http_requests_total
                .with_label_values(&["other", "404"])
                .get(),
            1.0
        );
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let (_, _, state) = test_state();
        route(&Method::GET, "/health", b"", &state);
        let response = route(&Method::GET, "/metrics", b"", &state);
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("isprinklr_http_requests_total"));
    }

    #[tokio::test]
    async fn test_server_over_tcp() {
        let (controller, _, state) = test_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = tokio::spawn(serve(listener, Arc::new(state), shutdown_rx));

        let body = r#"{"zone": 6, "minutes": 20}"#;
        let request = format!(
            "POST /api/start HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains(r#""status":"started""#));
        assert_eq!(controller.running_zones()[0].zone, 6);

        shutdown_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
