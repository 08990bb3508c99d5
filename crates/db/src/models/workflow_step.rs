//! Workflow step models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taskflow_core::types::{DbId, Timestamp};
use taskflow_core::workflow::StepPosition;
use validator::Validate;

/// A row from the `workflow_steps` table, with its explicit approvers.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowStep {
    pub id: DbId,
    pub template_id: DbId,
    pub name: String,
    pub step_type: String,
    #[serde(rename = "order")]
    pub step_order: i32,
    pub approver_type: String,
    pub config: serde_json::Value,
    pub is_required: bool,
    pub timeout_hours: i32,
    /// User ids from `workflow_step_approvers`, ascending.
    pub approver_ids: Vec<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WorkflowStep {
    pub fn position(&self) -> StepPosition {
        StepPosition {
            id: self.id,
            order: self.step_order,
        }
    }
}

/// DTO for one step inside [`CreateWorkflowTemplate`].
///
/// [`CreateWorkflowTemplate`]: crate::models::workflow_template::CreateWorkflowTemplate
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWorkflowStep {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub step_type: String,
    #[validate(range(min = 1))]
    pub order: i32,
    pub approver_type: Option<String>,
    #[serde(default)]
    pub approver_ids: Vec<DbId>,
    pub config: Option<serde_json::Value>,
    pub is_required: Option<bool>,
    #[validate(range(min = 0))]
    pub timeout_hours: Option<i32>,
}
