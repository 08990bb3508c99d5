//! Workflow template models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taskflow_core::types::{DbId, Timestamp};
use validator::Validate;

use crate::models::workflow_step::{CreateWorkflowStep, WorkflowStep};

/// A row from the `workflow_templates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowTemplate {
    pub id: DbId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub is_active: bool,
    pub is_public: bool,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a template together with its ordered steps.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWorkflowTemplate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_public: Option<bool>,
    #[serde(default)]
    #[validate(nested)]
    pub steps: Vec<CreateWorkflowStep>,
}

/// DTO for updating template metadata. Steps are immutable once created.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateWorkflowTemplate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_public: Option<bool>,
}

/// Query parameters for `GET /workflow-templates`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowTemplateListParams {
    #[serde(default)]
    pub include_inactive: bool,
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A template with its steps in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowTemplateDetail {
    #[serde(flatten)]
    pub template: WorkflowTemplate,
    pub steps: Vec<WorkflowStep>,
}
