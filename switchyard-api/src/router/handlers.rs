use crate::app::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::net::SocketAddr;
use switchyard_relay::ProxyError;
use tracing::{info, warn};

/// Records every inbound request into the stats window before routing,
/// reserved endpoints included.
pub async fn stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    state.service.stats().record_request_start();
    next.run(request).await
}

/// `GET /lb-health`: 200 while at least one backend is healthy, 503
/// otherwise.
pub async fn lb_health(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.service.registry();
    let healthy = registry.healthy_count();
    let total = registry.len();

    let (status_code, status) = if healthy > 0 {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "healthy_servers": healthy,
            "backend_servers": total,
        })),
    )
}

/// `GET /lb-stats`: queryable stats snapshot.
pub async fn lb_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.snapshot())
}

/// `POST /reset-stats`: zeroes counters and the timestamp window.
/// Backend health flags are untouched.
pub async fn reset_stats(State(state): State<AppState>) -> impl IntoResponse {
    state.service.stats().reset();
    info!("Statistics counters reset");
    Json(json!({ "status": "ok" }))
}

/// Catch-all reverse proxy: selects the next healthy backend and forwards
/// the request as-is.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let Some(backend) = state.service.select_backend() else {
        state.service.stats().record_failure();
        warn!(
            "No healthy backend available for {} {}",
            request.method(),
            request.uri().path()
        );
        return ProxyError::NoHealthyBackend.into_response();
    };

    match state.forwarder.forward(&backend, &client_ip, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
