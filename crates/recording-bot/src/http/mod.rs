//! HTTP serving surface.
//!
//! - `/` - bootstrap page loaded by the hosted page on navigation
//! - `/bundle.json` - capture bundle (see [`CaptureProfile`])
//! - `/health`, `/ready` - liveness and readiness
//! - `/metrics` - Prometheus metrics, when a recorder is installed

use crate::hosted::CaptureProfile;
use crate::observability::{health_router, HealthState};
use axum::{
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Bootstrap page. The in-process environment only checks that it loads.
pub const INDEX_HTML: &str = "<!DOCTYPE html>
<html>
  <head>
    <meta charset=\"utf-8\">
    <title>recording-bot</title>
  </head>
  <body>
    <link rel=\"preload\" href=\"bundle.json\" as=\"fetch\">
  </body>
</html>
";

/// Build the serving surface.
pub fn build_routes(
    profile: CaptureProfile,
    health_state: Arc<HealthState>,
    metrics_handle: Option<PrometheusHandle>,
) -> Router {
    let profile = Arc::new(profile);
    let mut routes = Router::new()
        .route("/", get(index_handler))
        .route(
            "/bundle.json",
            get(move || {
                let profile = Arc::clone(&profile);
                async move { Json(profile.as_ref().clone()) }
            }),
        )
        .merge(health_router(health_state));

    if let Some(handle) = metrics_handle {
        routes = routes.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    routes.layer(TraceLayer::new_for_http())
}

async fn index_handler() -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Html(INDEX_HTML),
    )
}
