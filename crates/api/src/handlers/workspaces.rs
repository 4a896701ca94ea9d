use axum::extract::{Path, State};
use axum::Json;
use gatehouse_review::SyncReport;

use crate::error::AppResult;
use crate::middleware::auth::ApiCaller;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/workspaces/{workspace_id}/short-codes/sync
///
/// Backfill the short-code index for cases that predate it.
pub async fn sync_short_codes(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> AppResult<Json<DataResponse<SyncReport>>> {
    let report = state
        .services
        .lookup
        .sync_short_code_mappings(&workspace_id)
        .await?;
    tracing::info!(
        workspace_id = %workspace_id,
        scanned = report.scanned,
        inserted = report.inserted,
        collisions = report.collisions,
        "Short-code sync finished"
    );
    Ok(Json(DataResponse { data: report }))
}
