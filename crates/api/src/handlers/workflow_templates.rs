//! Handlers for the `/workflow-templates` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use taskflow_core::types::DbId;
use taskflow_db::models::workflow_step::WorkflowStep;
use taskflow_db::models::workflow_template::{
    CreateWorkflowTemplate, UpdateWorkflowTemplate, WorkflowTemplate, WorkflowTemplateDetail,
    WorkflowTemplateListParams,
};

use crate::engine::registry::TemplateRegistry;
use crate::engine::Actor;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

fn registry(state: &AppState) -> TemplateRegistry<'_> {
    TemplateRegistry::new(&state.pool, &state.event_bus)
}

/// POST /api/v1/workflow-templates
pub async fn create_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateWorkflowTemplate>,
) -> AppResult<(StatusCode, Json<DataResponse<WorkflowTemplateDetail>>)> {
    let detail = registry(&state).create(&Actor::from(&auth), &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// GET /api/v1/workflow-templates
pub async fn list_templates(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<WorkflowTemplateListParams>,
) -> AppResult<Json<DataResponse<Vec<WorkflowTemplate>>>> {
    let templates = registry(&state).list(&Actor::from(&auth), &params).await?;
    Ok(Json(DataResponse { data: templates }))
}

/// GET /api/v1/workflow-templates/{id}
pub async fn get_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkflowTemplateDetail>>> {
    let detail = registry(&state).get_detail(&Actor::from(&auth), id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// GET /api/v1/workflow-templates/{id}/steps
///
/// Steps in execution order.
pub async fn list_steps(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<WorkflowStep>>>> {
    let steps = registry(&state)
        .get_ordered_steps(&Actor::from(&auth), id)
        .await?;
    Ok(Json(DataResponse { data: steps }))
}

/// PUT /api/v1/workflow-templates/{id}
pub async fn update_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateWorkflowTemplate>,
) -> AppResult<Json<DataResponse<WorkflowTemplate>>> {
    let template = registry(&state)
        .update(&Actor::from(&auth), id, &input)
        .await?;
    Ok(Json(DataResponse { data: template }))
}

/// POST /api/v1/workflow-templates/{id}/deactivate
pub async fn deactivate_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkflowTemplate>>> {
    let template = registry(&state).deactivate(&Actor::from(&auth), id).await?;
    Ok(Json(DataResponse { data: template }))
}

/// POST /api/v1/workflow-templates/{id}/activate
pub async fn activate_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkflowTemplate>>> {
    let template = registry(&state).activate(&Actor::from(&auth), id).await?;
    Ok(Json(DataResponse { data: template }))
}

/// DELETE /api/v1/workflow-templates/{id}
///
/// 409 while any instance references the template.
pub async fn delete_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    registry(&state).delete(&Actor::from(&auth), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
