//! Workflow step instance models, DTOs, and read views.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taskflow_core::overdue;
use taskflow_core::types::{DbId, Timestamp};

/// A row from the `workflow_step_instances` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct WorkflowStepInstance {
    pub id: DbId,
    pub instance_id: DbId,
    pub step_id: DbId,
    pub status: String,
    pub assigned_to: Option<DbId>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub completed_by: Option<DbId>,
    pub result: Option<String>,
    pub comments: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Request body for `POST /workflow-instances/{id}/steps/{step_id}/complete`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteStepRequest {
    pub outcome: String,
    #[serde(default)]
    pub comments: String,
}

/// A step instance joined with its step's name and order.
#[derive(Debug, Clone, FromRow)]
pub struct StepInstanceWithStep {
    #[sqlx(flatten)]
    pub step_instance: WorkflowStepInstance,
    pub step_name: String,
    pub step_order: i32,
}

/// A step instance with its step's name and order, plus derived duration.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStepInstanceView {
    #[serde(flatten)]
    pub step_instance: WorkflowStepInstance,
    pub step_name: String,
    pub step_order: i32,
    pub duration_secs: Option<i64>,
}

impl WorkflowStepInstanceView {
    pub fn build(row: StepInstanceWithStep, now: Timestamp) -> Self {
        let StepInstanceWithStep {
            step_instance,
            step_name,
            step_order,
        } = row;
        let duration_secs =
            overdue::step_elapsed(step_instance.started_at, step_instance.completed_at, now)
                .map(|d| d.num_seconds());
        Self {
            step_instance,
            step_name,
            step_order,
            duration_secs,
        }
    }
}
