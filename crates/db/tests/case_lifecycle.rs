use assert_matches::assert_matches;
use gatehouse_core::case_status::CaseStatus;
use gatehouse_core::claim::{ClaimOutcome, UnclaimOutcome};
use gatehouse_core::decision::{DecisionKind, DecisionOutcome};
use gatehouse_core::short_code::derive_short_code;
use gatehouse_db::models::case::{Case, CreateCase};
use gatehouse_db::repositories::{
    ActionRepo, ApplyDecision, CaseMessageRepo, CaseRepo, ClaimRepo, DecisionAttempt,
    DecisionRepo, ShortCodeRepo,
};
use sqlx::SqlitePool;

async fn submitted_case(pool: &SqlitePool, applicant: &str) -> Case {
    let case = CaseRepo::create(
        pool,
        &CreateCase {
            workspace_id: "ws1".to_string(),
            applicant_id: applicant.to_string(),
            origin_message_id: None,
        },
    )
    .await
    .unwrap();
    CaseRepo::submit(pool, &case.id).await.unwrap().unwrap()
}

fn decision(case: &Case, handler: &str, kind: DecisionKind, reason: Option<&str>) -> ApplyDecision {
    ApplyDecision {
        case_id: case.id.clone(),
        handler_id: handler.to_string(),
        kind,
        reason: reason.map(str::to_string),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_create_indexes_short_code_and_origin_message(pool: SqlitePool) {
    let case = CaseRepo::create(
        &pool,
        &CreateCase {
            workspace_id: "ws1".to_string(),
            applicant_id: "a1".to_string(),
            origin_message_id: Some("msg-1".to_string()),
        },
    )
    .await
    .unwrap();
    assert_eq!(case.parsed_status().unwrap(), CaseStatus::Draft);

    let code = derive_short_code(&case.id).unwrap();
    let by_code = ShortCodeRepo::find_case(&pool, "ws1", &code).await.unwrap().unwrap();
    assert_eq!(by_code.id, case.id);

    let by_message = CaseMessageRepo::find_case(&pool, "ws1", "msg-1").await.unwrap().unwrap();
    assert_eq!(by_message.id, case.id);

    // Codes are scoped per workspace.
    assert!(ShortCodeRepo::find_case(&pool, "ws2", &code).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_submit_only_from_draft(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    assert_eq!(case.parsed_status().unwrap(), CaseStatus::Submitted);
    assert!(case.submitted_at.is_some());
    assert!(CaseRepo::submit(&pool, &case.id).await.unwrap().is_none());
    assert!(CaseRepo::submit(&pool, "missing").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_find_open_by_applicant_skips_terminal(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    let open = CaseRepo::find_open_by_applicant(&pool, "ws1", "a1").await.unwrap();
    assert_eq!(open.unwrap().id, case.id);

    DecisionRepo::apply(&pool, &decision(&case, "h1", DecisionKind::Approve, None))
        .await
        .unwrap();
    assert!(CaseRepo::find_open_by_applicant(&pool, "ws1", "a1").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_approve_twice_records_one_action(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    let input = decision(&case, "h1", DecisionKind::Approve, None);

    let first = DecisionRepo::apply(&pool, &input).await.unwrap();
    assert_matches!(first, DecisionAttempt::Decided(DecisionOutcome::Changed { .. }));
    let second = DecisionRepo::apply(&pool, &input).await.unwrap();
    assert_eq!(second, DecisionAttempt::Decided(DecisionOutcome::Already));

    assert_eq!(ActionRepo::count_for_case(&pool, &case.id, "approve").await.unwrap(), 1);
    let stored = CaseRepo::find_by_id(&pool, &case.id).await.unwrap().unwrap();
    assert_eq!(stored.parsed_status().unwrap(), CaseStatus::Approved);
    assert_eq!(stored.resolver_id.as_deref(), Some("h1"));
    assert!(stored.resolved_at.is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_second_terminal_decision_is_refused(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    DecisionRepo::apply(&pool, &decision(&case, "h1", DecisionKind::Kick, Some("spam")))
        .await
        .unwrap();

    let attempt = DecisionRepo::apply(&pool, &decision(&case, "h1", DecisionKind::Approve, None))
        .await
        .unwrap();
    assert_eq!(
        attempt,
        DecisionAttempt::Decided(DecisionOutcome::Terminal {
            current: CaseStatus::Kicked
        })
    );
    let stored = CaseRepo::find_by_id(&pool, &case.id).await.unwrap().unwrap();
    assert_eq!(stored.parsed_status().unwrap(), CaseStatus::Kicked);
    assert_eq!(ActionRepo::count_for_case(&pool, &case.id, "approve").await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_draft_cannot_be_decided(pool: SqlitePool) {
    let case = CaseRepo::create(
        &pool,
        &CreateCase {
            workspace_id: "ws1".to_string(),
            applicant_id: "a1".to_string(),
            origin_message_id: None,
        },
    )
    .await
    .unwrap();
    let attempt = DecisionRepo::apply(&pool, &decision(&case, "h1", DecisionKind::Reject, None))
        .await
        .unwrap();
    assert_eq!(
        attempt,
        DecisionAttempt::Decided(DecisionOutcome::Invalid {
            current: CaseStatus::Draft
        })
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_perm_reject_sets_flag(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    DecisionRepo::apply(&pool, &decision(&case, "h1", DecisionKind::PermReject, Some("ban evasion")))
        .await
        .unwrap();
    let stored = CaseRepo::find_by_id(&pool, &case.id).await.unwrap().unwrap();
    assert_eq!(stored.parsed_status().unwrap(), CaseStatus::Rejected);
    assert!(stored.permanently_rejected);
    assert!(stored.permanently_rejected_at.is_some());
    assert_eq!(ActionRepo::count_for_case(&pool, &case.id, "perm_reject").await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_decision_blocked_by_other_claim(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    ClaimRepo::acquire(&pool, &case.id, "h1").await.unwrap();

    let attempt = DecisionRepo::apply(&pool, &decision(&case, "h2", DecisionKind::Approve, None))
        .await
        .unwrap();
    assert_matches!(attempt, DecisionAttempt::Blocked(conflict) if conflict.holder_id == "h1");
    let stored = CaseRepo::find_by_id(&pool, &case.id).await.unwrap().unwrap();
    assert_eq!(stored.parsed_status().unwrap(), CaseStatus::Submitted);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_terminal_decision_clears_claim(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    ClaimRepo::acquire(&pool, &case.id, "h1").await.unwrap();
    DecisionRepo::apply(
        &pool,
        &decision(&case, "h1", DecisionKind::Reject, Some("incomplete answers")),
    )
    .await
    .unwrap();
    assert!(ClaimRepo::get(&pool, &case.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_needs_info_keeps_claim(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    ClaimRepo::acquire(&pool, &case.id, "h1").await.unwrap();
    let attempt = DecisionRepo::apply(&pool, &decision(&case, "h1", DecisionKind::NeedsInfo, None))
        .await
        .unwrap();
    assert_matches!(attempt, DecisionAttempt::Decided(DecisionOutcome::Changed { .. }));
    assert!(ClaimRepo::get(&pool, &case.id).await.unwrap().is_some());
    let stored = CaseRepo::find_by_id(&pool, &case.id).await.unwrap().unwrap();
    assert!(stored.resolved_at.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_claim_outcomes(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;

    assert_matches!(
        ClaimRepo::acquire(&pool, &case.id, "h1").await.unwrap(),
        ClaimOutcome::Claimed { refreshed: false, .. }
    );
    assert_matches!(
        ClaimRepo::acquire(&pool, &case.id, "h1").await.unwrap(),
        ClaimOutcome::Claimed { refreshed: true, .. }
    );
    assert_eq!(
        ClaimRepo::acquire(&pool, &case.id, "h2").await.unwrap(),
        ClaimOutcome::AlreadyClaimed {
            holder_id: "h1".to_string()
        }
    );
    assert_eq!(
        ClaimRepo::acquire(&pool, "missing", "h1").await.unwrap(),
        ClaimOutcome::NotFound
    );
    // One claim record despite the refresh.
    assert_eq!(ActionRepo::count_for_case(&pool, &case.id, "claim").await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_claim_on_terminal_case_is_invalid(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    DecisionRepo::apply(&pool, &decision(&case, "h1", DecisionKind::Approve, None))
        .await
        .unwrap();
    assert_eq!(
        ClaimRepo::acquire(&pool, &case.id, "h2").await.unwrap(),
        ClaimOutcome::InvalidStatus {
            status: CaseStatus::Approved
        }
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_upsert_as_other_handler_is_noop(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    assert!(ClaimRepo::upsert(&pool, &case.id, "h1").await.unwrap().is_some());
    assert!(ClaimRepo::upsert(&pool, &case.id, "h2").await.unwrap().is_none());
    let claim = ClaimRepo::get(&pool, &case.id).await.unwrap().unwrap();
    assert_eq!(claim.handler_id, "h1");
    assert!(ClaimRepo::clear(&pool, &case.id).await.unwrap());
    assert!(!ClaimRepo::clear(&pool, &case.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_unclaim_outcomes(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    assert_eq!(
        ClaimRepo::release(&pool, &case.id, "h1").await.unwrap(),
        UnclaimOutcome::NotClaimed
    );

    ClaimRepo::acquire(&pool, &case.id, "h1").await.unwrap();
    assert_eq!(
        ClaimRepo::release(&pool, &case.id, "h2").await.unwrap(),
        UnclaimOutcome::NotOwner {
            holder_id: "h1".to_string()
        }
    );
    assert_eq!(
        ClaimRepo::release(&pool, &case.id, "h1").await.unwrap(),
        UnclaimOutcome::Released
    );
    assert_eq!(ActionRepo::count_for_case(&pool, &case.id, "unclaim").await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_attach_metadata_merges(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    let DecisionAttempt::Decided(DecisionOutcome::Changed { action_id }) =
        DecisionRepo::apply(&pool, &decision(&case, "h1", DecisionKind::Approve, None))
            .await
            .unwrap()
    else {
        panic!("expected a change");
    };

    ActionRepo::attach_metadata(&pool, action_id, &serde_json::json!({"dmDelivered": false}))
        .await
        .unwrap();
    ActionRepo::attach_metadata(&pool, action_id, &serde_json::json!({"membershipGranted": true}))
        .await
        .unwrap();

    let records = ActionRepo::list_for_case(&pool, &case.id).await.unwrap();
    let approve = records.iter().find(|r| r.id == action_id).unwrap();
    let meta = &approve.metadata.as_ref().unwrap().0;
    assert_eq!(meta["dmDelivered"], false);
    assert_eq!(meta["membershipGranted"], true);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_list_unindexed_and_backfill(pool: SqlitePool) {
    let case = submitted_case(&pool, "a1").await;
    sqlx::query("DELETE FROM short_code_index")
        .execute(&pool)
        .await
        .unwrap();

    let missing = ShortCodeRepo::list_unindexed(&pool, "ws1").await.unwrap();
    assert_eq!(missing.len(), 1);

    let code = derive_short_code(&case.id).unwrap();
    assert!(ShortCodeRepo::insert_ignore(&pool, "ws1", &code, &case.id).await.unwrap());
    assert!(!ShortCodeRepo::insert_ignore(&pool, "ws1", &code, &case.id).await.unwrap());
    assert_eq!(ShortCodeRepo::count(&pool, "ws1").await.unwrap(), 1);
    assert!(ShortCodeRepo::list_unindexed(&pool, "ws1").await.unwrap().is_empty());
}
