use crate::app::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{lb_health, lb_stats, proxy_handler, reset_stats, stats_middleware};

/// Builds the router: the reserved local endpoints are intercepted before
/// proxying, everything else falls through to the catch-all forwarder.
pub fn create_app_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/lb-health", get(lb_health))
        .route("/lb-stats", get(lb_stats))
        .route("/reset-stats", post(reset_stats))
        .fallback(proxy_handler)
        .layer(middleware::from_fn_with_state(state, stats_middleware))
        .layer(TraceLayer::new_for_http())
}
