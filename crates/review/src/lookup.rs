//! Resolve what a staff member has in hand (a code, a message, an id) to a
//! case.
//!
//! The short-code index is maintained synchronously on intake, so the
//! fallback scan only ever finds cases created before the index existed or
//! imported around it. A fallback hit backfills the index.

use gatehouse_core::short_code::{derive_short_code, is_complete, normalize_code};
use gatehouse_db::models::case::Case;
use gatehouse_db::repositories::{CaseMessageRepo, CaseRepo, ShortCodeRepo};
use gatehouse_db::DbPool;
use serde::Serialize;

use crate::error::ReviewResult;

/// Result of a short-code backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Cases with no index row before the sync.
    pub scanned: usize,
    pub inserted: usize,
    /// Rows whose code could not be derived.
    pub skipped: usize,
    /// Codes already taken by another case in the workspace.
    pub collisions: usize,
}

#[derive(Clone)]
pub struct CaseLookup {
    pool: DbPool,
}

impl CaseLookup {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn load(&self, case_id: &str) -> ReviewResult<Option<Case>> {
        Ok(CaseRepo::find_by_id(&self.pool, case_id).await?)
    }

    pub async fn find_open_by_applicant(
        &self,
        workspace_id: &str,
        applicant_id: &str,
    ) -> ReviewResult<Option<Case>> {
        Ok(CaseRepo::find_open_by_applicant(&self.pool, workspace_id, applicant_id).await?)
    }

    /// Look a case up by short code, normalizing the input first.
    pub async fn find_by_short_code(
        &self,
        workspace_id: &str,
        raw_code: &str,
    ) -> ReviewResult<Option<Case>> {
        let code = normalize_code(raw_code);
        if !is_complete(&code) {
            return Ok(None);
        }

        if let Some(case) = ShortCodeRepo::find_case(&self.pool, workspace_id, &code).await? {
            return Ok(Some(case));
        }

        // Index miss: derive the code for every case in the workspace.
        let cases = CaseRepo::list_by_workspace(&self.pool, workspace_id).await?;
        let hit = cases
            .into_iter()
            .find(|case| derive_short_code(&case.id).is_ok_and(|c| c == code));

        if let Some(case) = &hit {
            tracing::info!(case_id = %case.id, code = %code, "Short code found by scan, backfilling index");
            if let Err(e) =
                ShortCodeRepo::insert_ignore(&self.pool, workspace_id, &code, &case.id).await
            {
                tracing::warn!(error = %e, case_id = %case.id, "Short-code backfill failed");
            }
        }
        Ok(hit)
    }

    /// Resolve by originating message, then short code, then full case id.
    /// The first match wins.
    pub async fn resolve(
        &self,
        workspace_id: &str,
        code: Option<&str>,
        message_id: Option<&str>,
    ) -> ReviewResult<Option<Case>> {
        if let Some(message_id) = message_id.map(str::trim).filter(|m| !m.is_empty()) {
            if let Some(case) =
                CaseMessageRepo::find_case(&self.pool, workspace_id, message_id).await?
            {
                return Ok(Some(case));
            }
        }

        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };

        if let Some(case) = self.find_by_short_code(workspace_id, code).await? {
            return Ok(Some(case));
        }

        let by_id = CaseRepo::find_by_id(&self.pool, code).await?;
        Ok(by_id.filter(|case| case.workspace_id == workspace_id))
    }

    /// Link a platform message (e.g. the intake card) to a case so it
    /// resolves directly. Returns `false` if the message was already linked.
    pub async fn link_message(&self, case: &Case, message_id: &str) -> ReviewResult<bool> {
        Ok(CaseMessageRepo::link(&self.pool, message_id, &case.id, &case.workspace_id).await?)
    }

    /// Index every case in the workspace that has no short-code row.
    /// Running it again finds nothing to do.
    pub async fn sync_short_code_mappings(&self, workspace_id: &str) -> ReviewResult<SyncReport> {
        let missing = ShortCodeRepo::list_unindexed(&self.pool, workspace_id).await?;
        let mut report = SyncReport {
            scanned: missing.len(),
            ..SyncReport::default()
        };

        for case in missing {
            let code = match derive_short_code(&case.id) {
                Ok(code) => code,
                Err(e) => {
                    tracing::warn!(case_id = %case.id, error = %e, "Skipping case with underivable short code");
                    report.skipped += 1;
                    continue;
                }
            };
            if ShortCodeRepo::insert_ignore(&self.pool, workspace_id, &code, &case.id).await? {
                report.inserted += 1;
            } else {
                tracing::warn!(case_id = %case.id, code = %code, "Short-code collision, keeping existing mapping");
                report.collisions += 1;
            }
        }

        tracing::info!(
            workspace_id,
            scanned = report.scanned,
            inserted = report.inserted,
            skipped = report.skipped,
            collisions = report.collisions,
            "Short-code sync complete"
        );
        Ok(report)
    }
}
