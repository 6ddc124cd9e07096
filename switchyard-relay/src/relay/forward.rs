use crate::relay::error::ProxyError;
use anyhow::Result;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_balance::{BackendRegistry, StatsCollector};
use tracing::{debug, error};

/// Forwards a client request to a selected backend, streaming the body in
/// both directions, and records the latency/failure outcome.
pub struct ProxyForwarder {
    client: reqwest::Client,
    registry: Arc<BackendRegistry>,
    stats: Arc<StatsCollector>,
    internal_api_secret: String,
}

impl ProxyForwarder {
    pub fn new(
        registry: Arc<BackendRegistry>,
        stats: Arc<StatsCollector>,
        request_timeout: Duration,
        internal_api_secret: String,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            registry,
            stats,
            internal_api_secret,
        })
    }

    /// Forwards `request` to `backend` as
    /// `http://{backend}{path}{query}`.
    ///
    /// On success the elapsed time goes into the backend's latency
    /// window and the upstream response is passed through with the proxy
    /// headers added. A transport failure increments the failed-request
    /// counter and maps to a 502; it never touches the backend's health
    /// flag.
    pub async fn forward(
        &self,
        backend: &str,
        client_ip: &str,
        request: Request,
    ) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("http://{}{}", backend, path_and_query);

        let mut headers = parts.headers.clone();
        headers.remove(header::HOST);
        // the client re-frames the streamed body itself
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);
        headers.remove(header::CONNECTION);
        if let Ok(value) = HeaderValue::from_str(client_ip) {
            headers.insert("x-forwarded-for", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.internal_api_secret) {
            headers.insert("x-internal-secret", value);
        }

        let started = Instant::now();
        let upstream = self
            .client
            .request(parts.method.clone(), &url)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .send()
            .await
            .map_err(|e| {
                self.stats.record_failure();
                error!("Proxy request to {} failed: {}", url, e);
                ProxyError::Upstream {
                    backend: backend.to_string(),
                    source: e,
                }
            })?;

        let elapsed = started.elapsed();
        self.registry.record_latency(backend, elapsed);
        debug!(
            "Forwarded {} {} to {} ({}) in {}ms",
            parts.method,
            parts.uri.path(),
            backend,
            upstream.status(),
            elapsed.as_millis()
        );

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        response_headers.remove(header::TRANSFER_ENCODING);
        response_headers.remove(header::CONNECTION);
        response_headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        response_headers.insert("x-load-balancer", HeaderValue::from_static("switchyard"));
        if let Ok(value) = HeaderValue::from_str(backend) {
            response_headers.insert("x-backend-server", value);
        }

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}
