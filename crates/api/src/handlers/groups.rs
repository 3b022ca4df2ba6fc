use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use db::models::OperationRow;
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::ApiResult;

#[derive(Debug, Deserialize)]
pub struct ScheduleDto {
    pub requester: Uuid,
    pub group_count: usize,
    #[serde(default)]
    pub hold: bool,
}

/// Split every machine the requester may operate on into chained groups.
pub async fn schedule(
    Path(template_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ScheduleDto>,
) -> ApiResult<(StatusCode, Json<Vec<OperationRow>>)> {
    let operations = state
        .orchestrator
        .scheduler
        .schedule(payload.requester, template_id, payload.group_count, payload.hold)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(operations)))
}
