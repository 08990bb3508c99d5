//! Project entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taskflow_core::types::{DbId, Timestamp};

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub description: String,
    pub owner_id: DbId,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a project. The owner is the authenticated caller.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
}

/// Request body for adding a member to a project.
#[derive(Debug, Clone, Deserialize)]
pub struct AddProjectMember {
    pub user_id: DbId,
}

/// A member row joined with the user's name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectMember {
    pub user_id: DbId,
    pub username: String,
    pub joined_at: Timestamp,
}
