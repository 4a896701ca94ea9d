//! Case, claim, and action record models.

use gatehouse_core::case_status::CaseStatus;
use gatehouse_core::error::CoreError;
use gatehouse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/* --------------------------------------------------------------------------
   Cases
   -------------------------------------------------------------------------- */

/// A row from the `cases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Case {
    pub id: String,
    pub workspace_id: String,
    pub applicant_id: String,
    pub status: String,
    pub created_at: Timestamp,
    pub submitted_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
    pub resolver_id: Option<String>,
    pub resolution_reason: Option<String>,
    pub permanently_rejected: bool,
    pub permanently_rejected_at: Option<Timestamp>,
}

impl Case {
    /// Parse the stored status. The column is CHECK-constrained, so failure
    /// means the schema and the enum disagree.
    pub fn parsed_status(&self) -> Result<CaseStatus, CoreError> {
        self.status.parse()
    }
}

/// DTO for case intake.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCase {
    pub workspace_id: String,
    pub applicant_id: String,
    /// Platform message carrying the intake card, if already posted.
    pub origin_message_id: Option<String>,
}

/* --------------------------------------------------------------------------
   Claims
   -------------------------------------------------------------------------- */

/// A row from the `claims` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Claim {
    pub case_id: String,
    pub handler_id: String,
    pub claimed_at: Timestamp,
}

/* --------------------------------------------------------------------------
   Action records
   -------------------------------------------------------------------------- */

/// A row from the append-only `action_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActionRecord {
    pub id: DbId,
    pub case_id: String,
    pub handler_id: String,
    pub action: String,
    /// Unix seconds.
    pub created_at: i64,
    pub reason: Option<String>,
    pub metadata: Option<Json<serde_json::Value>>,
}

/// DTO for appending an action record.
#[derive(Debug, Clone)]
pub struct CreateActionRecord {
    pub case_id: String,
    pub handler_id: String,
    pub action: String,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/* --------------------------------------------------------------------------
   Short-code index
   -------------------------------------------------------------------------- */

/// A row from the `short_code_index` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShortCodeEntry {
    pub workspace_id: String,
    pub code: String,
    pub case_id: String,
    pub created_at: Timestamp,
}
