//! Transcript reconstruction and flush failure handling.

mod common;

use common::{applicant_message, harness, staff_message, APPLICANT, ARCHIVE_CHANNEL};
use gatehouse_core::relay::Direction;
use gatehouse_core::transcript::Side;
use gatehouse_db::repositories::{MessageMappingRepo, TicketRepo};
use gatehouse_events::event_types;
use gatehouse_review::loopback::FailureSwitches;
use sqlx::SqlitePool;

// ---------------------------------------------------------------------------
// Test: with only persisted mappings, the transcript is rebuilt in order
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn rebuilds_from_mappings_after_restart(pool: SqlitePool) {
    let h = harness(pool);
    let (ticket_id, channel_id) = h.open_bridge(APPLICANT, None).await;
    let router = &h.services.router;

    router
        .route_inbound(&staff_message(&channel_id, "s1", "first"), Direction::ToApplicant)
        .await
        .unwrap();
    router
        .route_inbound(&applicant_message("p1", "second"), Direction::ToHandler)
        .await
        .unwrap();
    router
        .route_inbound(&staff_message(&channel_id, "s2", "third"), Direction::ToApplicant)
        .await
        .unwrap();

    // Simulate a restart: the in-memory buffer is gone.
    h.services.transcripts.discard(ticket_id).await;
    assert_eq!(h.services.transcripts.buffered_len(ticket_id).await, 0);

    let lines = h.services.transcripts.lines_for(ticket_id).await.unwrap();
    let mappings = MessageMappingRepo::count_for_ticket(&h.pool, ticket_id).await.unwrap();
    assert_eq!(lines.len() as i64, mappings);
    let contents: Vec<&str> = lines.iter().map(|l| l.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
    assert_eq!(lines[1].side, Side::Applicant);

    let ticket = TicketRepo::find_by_id(&h.pool, ticket_id).await.unwrap().unwrap();
    let transcript = h.services.transcripts.flush(&ticket).await.unwrap().unwrap();
    assert_eq!(transcript.channel_id, ARCHIVE_CHANNEL);
    assert_eq!(transcript.line_count, 3);
    assert_eq!(h.gateway.uploads()[0].body.lines().count(), 3);
}

// ---------------------------------------------------------------------------
// Test: a failed upload keeps the buffer and publishes a failure event
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn failed_flush_keeps_buffer(pool: SqlitePool) {
    let h = harness(pool);
    let (ticket_id, channel_id) = h.open_bridge(APPLICANT, None).await;
    h.services
        .router
        .route_inbound(&staff_message(&channel_id, "s1", "hello"), Direction::ToApplicant)
        .await
        .unwrap();
    h.gateway.set_failures(FailureSwitches {
        upload: true,
        ..FailureSwitches::default()
    });
    let mut rx = h.bus.subscribe();

    let ticket = TicketRepo::find_by_id(&h.pool, ticket_id).await.unwrap().unwrap();
    assert!(h.services.transcripts.flush(&ticket).await.is_err());
    assert_eq!(h.services.transcripts.buffered_len(ticket_id).await, 1);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type, event_types::TRANSCRIPT_FLUSH_FAILED);
    assert!(event.is_failure());
}
