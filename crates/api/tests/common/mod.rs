#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use gatehouse_events::{EventBus, MonitoringTrail};
use gatehouse_review::{BridgeConfig, Collaborators, LoopbackGateway, ReviewServices};
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tower::ServiceExt;

use gatehouse_api::config::ServerConfig;
use gatehouse_api::router::build_app_router;
use gatehouse_api::state::AppState;

pub const API_TOKEN: &str = "test-token";
pub const WORKSPACE: &str = "ws1";
pub const APPLICANT: &str = "a1";
pub const HANDLER: &str = "h1";
pub const OTHER_HANDLER: &str = "h2";

/// Build a test `ServerConfig` with safe defaults and a known API token.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        gateway: None,
        api_token: Some(API_TOKEN.to_string()),
        bridge: BridgeConfig {
            transcript_channel_id: Some("archive".to_string()),
            branding_name: "Acme".to_string(),
            ..BridgeConfig::default()
        },
    }
}

/// The app plus the in-memory gateway behind it.
pub struct TestApp {
    pub router: Router,
    pub gateway: Arc<LoopbackGateway>,
    pub state: AppState,
}

/// Build the full application router, with the same middleware stack as
/// production, over the given pool and a loopback gateway where `h1` and
/// `h2` are staff.
pub fn build_test_app(pool: SqlitePool) -> TestApp {
    let gateway = Arc::new(LoopbackGateway::with_staff([HANDLER, OTHER_HANDLER]));
    gateway.set_profile(APPLICANT, "Jane Applicant");
    gateway.set_profile(HANDLER, "Hank");
    build_test_app_with(pool, gateway, test_config())
}

pub fn build_test_app_with(
    pool: SqlitePool,
    gateway: Arc<LoopbackGateway>,
    config: ServerConfig,
) -> TestApp {
    let event_bus = Arc::new(EventBus::default());
    let services = ReviewServices::new(
        pool.clone(),
        Collaborators::from_gateway(gateway.clone()),
        Arc::clone(&event_bus),
        config.bridge.clone(),
    );
    let trail = MonitoringTrail::default();
    // Feed the trail the way main does.
    tokio::spawn(trail.clone().run(event_bus.subscribe()));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        services,
        event_bus,
        trail,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        gateway,
        state,
    }
}

/// Send an authenticated GET request.
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

/// Send an authenticated POST request with a JSON body.
pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {API_TOKEN}"));
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
