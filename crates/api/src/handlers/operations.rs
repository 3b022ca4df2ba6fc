use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use db::models::{DirectiveRow, OperationRow};
use engine::{AdmissionRequest, StartMode};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::ApiResult;

#[derive(Debug, Deserialize)]
pub struct AdmitDto {
    pub requester: Uuid,
    pub machine_ids: Vec<Uuid>,
    #[serde(default)]
    pub previous_id: Option<Uuid>,
    #[serde(default)]
    pub mode: StartMode,
}

/// Admit one operation of the template on the requested machines.
pub async fn admit(
    Path(template_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<AdmitDto>,
) -> ApiResult<(StatusCode, Json<OperationRow>)> {
    let operation = state
        .orchestrator
        .admitter
        .admit(AdmissionRequest {
            requester: payload.requester,
            template_id,
            machine_ids: payload.machine_ids,
            previous_id: payload.previous_id,
            mode: payload.mode,
        })
        .await?;

    // Execution happens elsewhere; the operation is only queued here.
    Ok((StatusCode::ACCEPTED, Json(operation)))
}

pub async fn release(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<OperationRow>> {
    Ok(Json(state.orchestrator.admitter.release(id).await?))
}

pub async fn directives(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DirectiveRow>>> {
    Ok(Json(state.orchestrator.directives(id).await?))
}
