//! Claim acquisition, release, and the claim guard.

mod common;

use assert_matches::assert_matches;
use common::{harness, APPLICANT, HANDLER, OTHER_HANDLER};
use gatehouse_core::claim::{ClaimOutcome, UnclaimOutcome};
use gatehouse_core::error::CoreError;
use gatehouse_events::event_types;
use gatehouse_review::ReviewError;
use sqlx::SqlitePool;

// ---------------------------------------------------------------------------
// Test: concurrent claims by two handlers, exactly one wins
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn concurrent_claims_have_one_winner(pool: SqlitePool) {
    let h = harness(pool);
    let case = h.submitted_case(APPLICANT).await;

    let claims = h.services.claims.clone();
    let (a, b) = futures::join!(
        claims.claim(&case.id, HANDLER),
        claims.claim(&case.id, OTHER_HANDLER)
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let winners: Vec<&str> = outcomes
        .iter()
        .filter_map(|o| match o {
            ClaimOutcome::Claimed { handler_id, .. } => Some(handler_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, ClaimOutcome::AlreadyClaimed { .. }))
            .count(),
        1
    );

    let stored = h.services.claims.get_claim(&case.id).await.unwrap().unwrap();
    assert_eq!(stored.handler_id, winners[0]);
}

// ---------------------------------------------------------------------------
// Test: claiming again refreshes without a second event
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn reclaim_refreshes_and_publishes_once(pool: SqlitePool) {
    let h = harness(pool);
    let case = h.submitted_case(APPLICANT).await;
    let mut rx = h.bus.subscribe();

    assert_matches!(
        h.services.claims.claim(&case.id, HANDLER).await.unwrap(),
        ClaimOutcome::Claimed { refreshed: false, .. }
    );
    assert_matches!(
        h.services.claims.claim(&case.id, HANDLER).await.unwrap(),
        ClaimOutcome::Claimed { refreshed: true, .. }
    );

    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type, event_types::CASE_CLAIMED);
    assert_eq!(event.case_id.as_deref(), Some(case.id.as_str()));
    assert!(rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: non-staff cannot claim
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn non_staff_claim_is_forbidden(pool: SqlitePool) {
    let h = harness(pool);
    let case = h.submitted_case(APPLICANT).await;

    let err = h.services.claims.claim(&case.id, "intruder").await.unwrap_err();
    assert_matches!(err, ReviewError::Core(CoreError::Forbidden(_)));
    assert!(h.services.claims.get_claim(&case.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: draft cases and unknown cases
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn draft_and_missing_cases_are_not_claimable(pool: SqlitePool) {
    let h = harness(pool);
    let draft = h.draft_case(APPLICANT).await;

    assert_matches!(
        h.services.claims.claim(&draft.id, HANDLER).await.unwrap(),
        ClaimOutcome::InvalidStatus { .. }
    );
    assert_matches!(
        h.services.claims.claim("no-such-case", HANDLER).await.unwrap(),
        ClaimOutcome::NotFound
    );
}

// ---------------------------------------------------------------------------
// Test: unclaim outcomes and the guard
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn unclaim_is_owner_only(pool: SqlitePool) {
    let h = harness(pool);
    let case = h.submitted_case(APPLICANT).await;
    h.services.claims.claim(&case.id, HANDLER).await.unwrap();

    let err = h.services.claims.guard(&case.id, OTHER_HANDLER).await.unwrap_err();
    assert_matches!(err, ReviewError::Claimed(c) if c.holder_id == HANDLER);
    h.services.claims.guard(&case.id, HANDLER).await.unwrap();

    assert_eq!(
        h.services.claims.unclaim(&case.id, OTHER_HANDLER).await.unwrap(),
        UnclaimOutcome::NotOwner {
            holder_id: HANDLER.to_string()
        }
    );
    assert_eq!(
        h.services.claims.unclaim(&case.id, HANDLER).await.unwrap(),
        UnclaimOutcome::Released
    );
    assert_eq!(
        h.services.claims.unclaim(&case.id, HANDLER).await.unwrap(),
        UnclaimOutcome::NotClaimed
    );
    h.services.claims.guard(&case.id, OTHER_HANDLER).await.unwrap();
}
