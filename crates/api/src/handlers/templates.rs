use axum::{Json, extract::State, http::StatusCode};
use db::models::OperationTemplateRow;
use engine::TemplateDraft;

use super::AppState;
use crate::ApiResult;

/// Create or update a template together with its restrictions.
pub async fn save(
    State(state): State<AppState>,
    Json(draft): Json<TemplateDraft>,
) -> ApiResult<(StatusCode, Json<OperationTemplateRow>)> {
    let status = if draft.id.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let template = state.orchestrator.templates.save(draft).await?;
    Ok((status, Json(template)))
}
