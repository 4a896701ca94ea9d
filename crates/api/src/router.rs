//! HTTP front door for the gateway callbacks.
//!
//! Every request gets an `x-request-id` (generated here unless the gateway
//! sent one), which is echoed on the response and copied into any JSON error
//! body as `correlation_id`. Requests are traced, bounded by
//! `REQUEST_TIMEOUT_SECS`, and a panicking handler becomes a 500. CORS only
//! admits the configured origins for GET and POST.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::middleware::correlation;
use crate::routes;
use crate::state::AppState;

/// Assemble `/health`, the `/api/v1` routes, and the middleware stack.
///
/// Layers run outermost first on a request: CORS, request id assignment,
/// tracing, request id propagation, timeout, panic recovery, and finally the
/// correlation scope, so handlers and `AppError` see the final request id.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = build_cors_layer(config);
    let request_id_header = HeaderName::from_static(correlation::REQUEST_ID_HEADER);

    Router::new()
        // Liveness stays outside the versioned prefix and the token check.
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        // Innermost: error bodies read the id from this scope.
        .layer(axum::middleware::from_fn(correlation::scope))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Echo the id so the gateway can match its logs.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Keep a gateway-supplied id, otherwise mint one.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Build the CORS middleware layer from server configuration.
///
/// Origins are validated in [`ServerConfig::from_env`]; anything that still
/// fails to parse is skipped.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
