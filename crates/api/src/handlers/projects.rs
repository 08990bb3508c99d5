//! Handlers for the `/projects` resource.
//!
//! Projects exist here as approver-resolution targets: owner and members.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use taskflow_core::error::CoreError;
use taskflow_core::types::DbId;
use taskflow_db::models::project::{AddProjectMember, CreateProject, Project, ProjectMember};
use taskflow_db::repositories::{ProjectRepo, UserRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

async fn find_project(state: &AppState, id: DbId) -> AppResult<Project> {
    ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))
}

/// POST /api/v1/projects
///
/// The caller becomes the owner and first member.
pub async fn create_project(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateProject>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    if input.name.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Project name must not be empty".into(),
        )));
    }

    let project = ProjectRepo::create(&state.pool, auth.user_id, &input).await?;
    tracing::info!(project_id = project.id, user_id = auth.user_id, "Project created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/projects/{id}
pub async fn get_project(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Project>>> {
    let project = find_project(&state, id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// GET /api/v1/projects/{id}/members
pub async fn list_members(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<ProjectMember>>>> {
    find_project(&state, id).await?;
    let members = ProjectRepo::list_members(&state.pool, id).await?;
    Ok(Json(DataResponse { data: members }))
}

/// POST /api/v1/projects/{id}/members
///
/// Owner or admin only. Adding an existing member is a no-op answered
/// with 200 instead of 201. Returns the member list.
pub async fn add_member(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AddProjectMember>,
) -> AppResult<(StatusCode, Json<DataResponse<Vec<ProjectMember>>>)> {
    let project = find_project(&state, id).await?;
    if !auth.is_admin() && project.owner_id != auth.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only the project owner or an admin may add members".into(),
        )));
    }
    UserRepo::find_by_id(&state.pool, input.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: input.user_id,
        }))?;

    let added = ProjectRepo::add_member(&state.pool, id, input.user_id).await?;
    if added {
        tracing::info!(project_id = id, member_id = input.user_id, "Project member added");
    }

    let members = ProjectRepo::list_members(&state.pool, id).await?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(DataResponse { data: members })))
}
