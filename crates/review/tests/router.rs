//! Message routing in both directions, echo suppression, and case replies.

mod common;

use assert_matches::assert_matches;
use common::{applicant_message, harness, staff_message, APPLICANT, HANDLER, OTHER_HANDLER};
use gatehouse_core::relay::{Attachment, Direction};
use gatehouse_db::repositories::MessageMappingRepo;
use gatehouse_review::loopback::FailureSwitches;
use gatehouse_review::{CloseTarget, IgnoreReason, ReviewError, RouteOutcome};
use sqlx::SqlitePool;

// ---------------------------------------------------------------------------
// Test: handler -> applicant is branded, mapped, and transcribed
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn staff_message_reaches_applicant(pool: SqlitePool) {
    let h = harness(pool);
    let (ticket_id, channel_id) = h.open_bridge(APPLICANT, None).await;

    let mut message = staff_message(&channel_id, "s1", "Hello there");
    message.attachments.push(Attachment {
        url: "https://cdn/id.png".to_string(),
        filename: Some("id.png".to_string()),
        content_type: Some("image/png".to_string()),
    });
    let outcome = h
        .services
        .router
        .route_inbound(&message, Direction::ToApplicant)
        .await
        .unwrap();
    let RouteOutcome::Delivered {
        ticket_id: routed,
        delivered_message_id,
    } = outcome
    else {
        panic!("expected delivery, got {outcome:?}");
    };
    assert_eq!(routed, ticket_id);

    // The first DM is the bridge-opened notice.
    let dms = h.gateway.direct_messages(APPLICANT);
    let relayed = dms.last().unwrap();
    assert_eq!(relayed.content, "Hello there");
    assert_eq!(relayed.presentation.as_ref().unwrap().display_name, "Acme");
    assert_eq!(relayed.image_url.as_deref(), Some("https://cdn/id.png"));

    let mapping = MessageMappingRepo::find_by_relay_id(&h.pool, "s1").await.unwrap().unwrap();
    assert_eq!(mapping.private_message_id, delivered_message_id);
    assert_eq!(mapping.direction, "to_applicant");
    assert_eq!(mapping.author_name, "Hank");
    assert_eq!(mapping.attachment_urls.0, vec!["https://cdn/id.png".to_string()]);
    assert_eq!(h.services.transcripts.buffered_len(ticket_id).await, 1);
}

// ---------------------------------------------------------------------------
// Test: a delivered message is never routed again
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn delivered_messages_are_not_rerouted(pool: SqlitePool) {
    let h = harness(pool);
    let (_, channel_id) = h.open_bridge(APPLICANT, None).await;

    let RouteOutcome::Delivered {
        delivered_message_id,
        ..
    } = h
        .services
        .router
        .route_inbound(&applicant_message("p1", "hi staff"), Direction::ToHandler)
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };

    // The platform reports our own relay post back as a new message.
    let echo = staff_message(&channel_id, &delivered_message_id, "hi staff");
    assert_eq!(
        h.services
            .router
            .route_inbound(&echo, Direction::ToApplicant)
            .await
            .unwrap(),
        RouteOutcome::Ignored {
            reason: IgnoreReason::Echo
        }
    );

    // The same inbound event delivered twice is also dropped.
    assert_eq!(
        h.services
            .router
            .route_inbound(&applicant_message("p1", "hi staff"), Direction::ToHandler)
            .await
            .unwrap(),
        RouteOutcome::Ignored {
            reason: IgnoreReason::Echo
        }
    );
    // Intro plus one relayed message.
    assert_eq!(h.gateway.channel_messages(&channel_id).len(), 2);
}

// ---------------------------------------------------------------------------
// Test: replies are mirrored through the mapping table
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn replies_are_mirrored(pool: SqlitePool) {
    let h = harness(pool);
    let (_, channel_id) = h.open_bridge(APPLICANT, None).await;

    let RouteOutcome::Delivered {
        delivered_message_id: private_id,
        ..
    } = h
        .services
        .router
        .route_inbound(&staff_message(&channel_id, "s1", "question?"), Direction::ToApplicant)
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };

    let mut answer = applicant_message("p1", "answer!");
    answer.reply_to_message_id = Some(private_id);
    h.services
        .router
        .route_inbound(&answer, Direction::ToHandler)
        .await
        .unwrap();

    let posted = h.gateway.channel_messages(&channel_id);
    let relayed = posted.last().unwrap();
    assert_eq!(relayed.reply_to_message_id.as_deref(), Some("s1"));
    assert_eq!(
        relayed.presentation.as_ref().unwrap().display_name,
        "Jane Applicant"
    );
}

// ---------------------------------------------------------------------------
// Test: empty messages and channels without a bridge are ignored
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn ignores_empty_and_unbridged(pool: SqlitePool) {
    let h = harness(pool);
    let (_, channel_id) = h.open_bridge(APPLICANT, None).await;

    assert_eq!(
        h.services
            .router
            .route_inbound(&staff_message(&channel_id, "s1", "   "), Direction::ToApplicant)
            .await
            .unwrap(),
        RouteOutcome::Ignored {
            reason: IgnoreReason::Empty
        }
    );
    assert_eq!(
        h.services
            .router
            .route_inbound(&staff_message("general", "s2", "hi"), Direction::ToApplicant)
            .await
            .unwrap(),
        RouteOutcome::Ignored {
            reason: IgnoreReason::NoBridge
        }
    );
    let mut stranger = applicant_message("p9", "hello?");
    stranger.author_id = "someone-else".to_string();
    assert_eq!(
        h.services
            .router
            .route_inbound(&stranger, Direction::ToHandler)
            .await
            .unwrap(),
        RouteOutcome::Ignored {
            reason: IgnoreReason::NoBridge
        }
    );
}

// ---------------------------------------------------------------------------
// Test: an unreachable applicant is reported in the relay channel
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn undeliverable_message_is_reported(pool: SqlitePool) {
    let h = harness(pool);
    let (ticket_id, channel_id) = h.open_bridge(APPLICANT, None).await;
    h.gateway.fail_direct_to(APPLICANT);

    let outcome = h
        .services
        .router
        .route_inbound(&staff_message(&channel_id, "s1", "ping"), Direction::ToApplicant)
        .await
        .unwrap();
    assert_matches!(outcome, RouteOutcome::Undelivered { ticket_id: t, .. } if t == ticket_id);

    let posted = h.gateway.channel_messages(&channel_id);
    assert!(posted.last().unwrap().content.contains("could not be delivered"));
    assert!(MessageMappingRepo::find_by_relay_id(&h.pool, "s1").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: a message that failed to deliver can be retried
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn undelivered_message_can_be_retried(pool: SqlitePool) {
    let h = harness(pool);
    let (ticket_id, channel_id) = h.open_bridge(APPLICANT, None).await;
    let message = staff_message(&channel_id, "s1", "ping");
    h.gateway.fail_direct_to(APPLICANT);

    let first = h
        .services
        .router
        .route_inbound(&message, Direction::ToApplicant)
        .await
        .unwrap();
    assert_matches!(first, RouteOutcome::Undelivered { .. });

    h.gateway.set_failures(FailureSwitches::default());
    let retry = h
        .services
        .router
        .route_inbound(&message, Direction::ToApplicant)
        .await
        .unwrap();
    assert_matches!(retry, RouteOutcome::Delivered { ticket_id: t, .. } if t == ticket_id);

    // Once delivered, the same event is an echo.
    let again = h
        .services
        .router
        .route_inbound(&message, Direction::ToApplicant)
        .await
        .unwrap();
    assert_matches!(
        again,
        RouteOutcome::Ignored {
            reason: IgnoreReason::Echo
        }
    );
}

// ---------------------------------------------------------------------------
// Test: a channel that is not an open bridge is ignored
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn closed_bridge_channel_is_not_routed(pool: SqlitePool) {
    let h = harness(pool);
    let (ticket_id, channel_id) = h.open_bridge(APPLICANT, None).await;
    h.services
        .bridge
        .close(&CloseTarget::Ticket(ticket_id), Some(HANDLER), None)
        .await
        .unwrap();
    assert!(!h.services.open_channels.contains(&channel_id));

    let outcome = h
        .services
        .router
        .route_inbound(&staff_message(&channel_id, "s9", "late"), Direction::ToApplicant)
        .await
        .unwrap();
    assert_matches!(
        outcome,
        RouteOutcome::Ignored {
            reason: IgnoreReason::NoBridge
        }
    );
}

// ---------------------------------------------------------------------------
// Test: replying from the case view
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn reply_from_case_is_mirrored_into_bridge(pool: SqlitePool) {
    let h = harness(pool);
    let case = h.submitted_case(APPLICANT).await;
    let (ticket_id, channel_id) = h.open_bridge(APPLICANT, None).await;
    h.services.claims.claim(&case.id, HANDLER).await.unwrap();

    let reply = h
        .services
        .router
        .reply_from_case(&case.id, HANDLER, "Please send your portfolio.")
        .await
        .unwrap();
    assert!(reply.delivery.is_sent());
    assert_eq!(reply.ticket_id, Some(ticket_id));

    let dm = h.gateway.direct_messages(APPLICANT).pop().unwrap();
    assert_eq!(dm.content, "Please send your portfolio.");
    let mirror = h.gateway.channel_messages(&channel_id).pop().unwrap();
    assert_eq!(mirror.content, "Please send your portfolio.");
    assert_eq!(
        MessageMappingRepo::count_for_ticket(&h.pool, ticket_id).await.unwrap(),
        1
    );

    let blocked = h
        .services
        .router
        .reply_from_case(&case.id, OTHER_HANDLER, "hi")
        .await
        .unwrap_err();
    assert_matches!(blocked, ReviewError::Claimed(_));
}
