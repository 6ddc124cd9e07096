use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the forwarding path.
///
/// Everything backend-facing is absorbed at the forwarder boundary and
/// translated into one of these; nothing propagates to the caller as an
/// unhandled fault.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The healthy subset of the pool is empty. The caller may retry;
    /// the proxy does not retry internally.
    #[error("no healthy backend available")]
    NoHealthyBackend,
    /// Transport-level failure talking to the chosen backend: connection
    /// refused, timeout, DNS failure. Does not affect backend health;
    /// health transitions belong to the probe loop alone.
    #[error("upstream request to {backend} failed: {source}")]
    Upstream {
        backend: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NoHealthyBackend => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": {
                "message": self.to_string(),
                "status": status.as_u16(),
            }
        });
        (status, Json(body)).into_response()
    }
}
