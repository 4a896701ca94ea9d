//! HTTP tests for the bridge lifecycle and message routing.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, get, post_json, APPLICANT, HANDLER, WORKSPACE};
use gatehouse_review::loopback::FailureSwitches;
use serde_json::json;
use sqlx::SqlitePool;

async fn open_bridge(app: &axum::Router) -> (i64, String) {
    let response = post_json(
        app,
        "/api/v1/bridges",
        json!({
            "workspace_id": WORKSPACE,
            "applicant_id": APPLICANT,
            "handler_id": HANDLER,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["outcome"], "opened");
    (
        json["data"]["ticket_id"].as_i64().unwrap(),
        json["data"]["channel_id"].as_str().unwrap().to_string(),
    )
}

// ---------------------------------------------------------------------------
// Test: open, relay both ways, close by channel, close again
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn bridge_round_trip(pool: SqlitePool) {
    let app = common::build_test_app(pool);
    let (ticket_id, channel_id) = open_bridge(&app.router).await;

    let again = body_json(
        post_json(
            &app.router,
            "/api/v1/bridges",
            json!({ "workspace_id": WORKSPACE, "applicant_id": APPLICANT, "handler_id": HANDLER }),
        )
        .await,
    )
    .await;
    assert_eq!(again["data"]["outcome"], "already_open");
    assert_eq!(again["data"]["channel_id"], channel_id.as_str());

    let staff = body_json(
        post_json(
            &app.router,
            "/api/v1/messages/inbound",
            json!({
                "direction": "to_applicant",
                "message": {
                    "message_id": "s1",
                    "channel_id": channel_id,
                    "author_id": HANDLER,
                    "workspace_id": WORKSPACE,
                    "content": "Hi, a quick question.",
                },
            }),
        )
        .await,
    )
    .await;
    assert_eq!(staff["data"]["outcome"], "delivered");
    assert_eq!(staff["data"]["ticket_id"], ticket_id);

    let applicant = body_json(
        post_json(
            &app.router,
            "/api/v1/messages/inbound",
            json!({
                "direction": "to_handler",
                "message": {
                    "message_id": "p1",
                    "channel_id": "dm-a1",
                    "author_id": APPLICANT,
                    "content": "Sure.",
                },
            }),
        )
        .await,
    )
    .await;
    assert_eq!(applicant["data"]["outcome"], "delivered");

    // Same event again is an echo.
    let echo = body_json(
        post_json(
            &app.router,
            "/api/v1/messages/inbound",
            json!({
                "direction": "to_handler",
                "message": {
                    "message_id": "p1",
                    "channel_id": "dm-a1",
                    "author_id": APPLICANT,
                    "content": "Sure.",
                },
            }),
        )
        .await,
    )
    .await;
    assert_eq!(echo["data"]["outcome"], "ignored");
    assert_eq!(echo["data"]["reason"], "echo");

    let closed = body_json(
        post_json(
            &app.router,
            "/api/v1/bridges/close",
            json!({ "channel_id": channel_id, "actor_id": HANDLER, "reason": "done" }),
        )
        .await,
    )
    .await;
    assert_eq!(closed["data"]["outcome"], "closed");
    assert_eq!(closed["data"]["disposal"], "deleted");
    assert_eq!(closed["data"]["transcript"]["line_count"], 2);

    let again = body_json(
        post_json(
            &app.router,
            "/api/v1/bridges/close",
            json!({ "ticket_id": ticket_id }),
        )
        .await,
    )
    .await;
    assert_eq!(again["data"]["outcome"], "already_closed");

    let health = body_json(get(&app.router, "/health").await).await;
    assert_eq!(health["open_bridges"], 0);
}

// ---------------------------------------------------------------------------
// Test: bad close requests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn close_requires_one_target(pool: SqlitePool) {
    let app = common::build_test_app(pool);

    let response = post_json(&app.router, "/api/v1/bridges/close", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let response = post_json(
        &app.router,
        "/api/v1/bridges/close",
        json!({ "ticket_id": 404 }),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["outcome"], "not_found");
}

// ---------------------------------------------------------------------------
// Test: a failed setup surfaces as a gateway error and can be retried
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn failed_setup_is_bad_gateway(pool: SqlitePool) {
    let app = common::build_test_app(pool);
    app.gateway.set_failures(FailureSwitches {
        create_channel: true,
        ..FailureSwitches::default()
    });

    let response = post_json(
        &app.router,
        "/api/v1/bridges",
        json!({ "workspace_id": WORKSPACE, "applicant_id": APPLICANT, "handler_id": HANDLER }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    app.gateway.set_failures(FailureSwitches::default());
    open_bridge(&app.router).await;
}

// ---------------------------------------------------------------------------
// Test: transcript failures show up in the monitoring trail
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn transcript_failure_reaches_trail(pool: SqlitePool) {
    let app = common::build_test_app(pool);
    let (ticket_id, channel_id) = open_bridge(&app.router).await;
    post_json(
        &app.router,
        "/api/v1/messages/inbound",
        json!({
            "direction": "to_applicant",
            "message": {
                "message_id": "s1",
                "channel_id": channel_id,
                "author_id": HANDLER,
                "workspace_id": WORKSPACE,
                "content": "hello",
            },
        }),
    )
    .await;
    app.gateway.set_failures(FailureSwitches {
        upload: true,
        ..FailureSwitches::default()
    });

    let closed = body_json(
        post_json(
            &app.router,
            "/api/v1/bridges/close",
            json!({ "ticket_id": ticket_id }),
        )
        .await,
    )
    .await;
    assert_eq!(closed["data"]["outcome"], "closed");
    assert!(closed["data"]["transcript"].is_null());

    // The trail subscriber runs on its own task.
    let mut entries = Vec::new();
    for _ in 0..50 {
        let trail = body_json(get(&app.router, "/api/v1/monitoring/trail").await).await;
        entries = trail["data"].as_array().cloned().unwrap_or_default();
        if !entries.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(entries
        .iter()
        .any(|e| e["event_type"] == "transcript.flush_failed"));
}
