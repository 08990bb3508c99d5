//! Handlers for the `/workflow-instances` resource.
//!
//! Step routes address a step by its template step id:
//! `/workflow-instances/{id}/steps/{step_id}/...`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use taskflow_core::types::DbId;
use taskflow_db::models::workflow_instance::{
    StartWorkflowInstance, WorkflowInstanceDetail, WorkflowInstanceListParams,
    WorkflowInstanceView,
};
use taskflow_db::models::workflow_step_instance::{CompleteStepRequest, WorkflowStepInstance};

use crate::engine::workflow::WorkflowEngine;
use crate::engine::Actor;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

fn engine(state: &AppState) -> WorkflowEngine<'_> {
    WorkflowEngine::new(&state.pool, &state.event_bus)
}

/// POST /api/v1/workflow-instances
pub async fn start_instance(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<StartWorkflowInstance>,
) -> AppResult<(StatusCode, Json<DataResponse<WorkflowInstanceDetail>>)> {
    let detail = engine(&state).start(&Actor::from(&auth), &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// GET /api/v1/workflow-instances
pub async fn list_instances(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<WorkflowInstanceListParams>,
) -> AppResult<Json<DataResponse<Vec<WorkflowInstanceView>>>> {
    let instances = engine(&state).list(&Actor::from(&auth), &params).await?;
    Ok(Json(DataResponse { data: instances }))
}

/// GET /api/v1/workflow-instances/{id}
pub async fn get_instance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkflowInstanceDetail>>> {
    let detail = engine(&state).get(&Actor::from(&auth), id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/workflow-instances/{id}/cancel
pub async fn cancel_instance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkflowInstanceDetail>>> {
    let detail = engine(&state).cancel(&Actor::from(&auth), id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// GET /api/v1/workflow-instances/{id}/steps/{step_id}/approvers
pub async fn list_step_approvers(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, step_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<Vec<DbId>>>> {
    let approvers = engine(&state)
        .approvers(&Actor::from(&auth), id, step_id)
        .await?;
    Ok(Json(DataResponse { data: approvers }))
}

/// POST /api/v1/workflow-instances/{id}/steps/{step_id}/begin
pub async fn begin_step(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, step_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<WorkflowStepInstance>>> {
    let step_instance = engine(&state)
        .begin_step(&Actor::from(&auth), id, step_id)
        .await?;
    Ok(Json(DataResponse {
        data: step_instance,
    }))
}

/// POST /api/v1/workflow-instances/{id}/steps/{step_id}/complete
pub async fn complete_step(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, step_id)): Path<(DbId, DbId)>,
    Json(input): Json<CompleteStepRequest>,
) -> AppResult<Json<DataResponse<WorkflowInstanceDetail>>> {
    let detail = engine(&state)
        .complete_step(&Actor::from(&auth), id, step_id, &input)
        .await?;
    Ok(Json(DataResponse { data: detail }))
}
