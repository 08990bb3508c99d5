//! Workflow instance models, DTOs, and read views.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taskflow_core::overdue;
use taskflow_core::types::{DbId, Timestamp};
use taskflow_core::workflow::InstanceStatus;

use crate::models::workflow_step::WorkflowStep;
use crate::models::workflow_step_instance::WorkflowStepInstanceView;

/// A row from the `workflow_instances` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct WorkflowInstance {
    pub id: DbId,
    pub template_id: DbId,
    pub name: String,
    pub status: String,
    pub project_id: Option<DbId>,
    pub task_id: Option<DbId>,
    pub current_step_id: Option<DbId>,
    pub started_by: DbId,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub result: Option<String>,
    pub notes: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Request body for `POST /workflow-instances`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartWorkflowInstance {
    pub template_id: DbId,
    /// Defaults to the template name.
    pub name: Option<String>,
    pub project_id: Option<DbId>,
    pub task_id: Option<DbId>,
    pub notes: Option<String>,
}

/// Fully resolved insert for a new instance.
#[derive(Debug, Clone)]
pub struct NewWorkflowInstance {
    pub template_id: DbId,
    pub name: String,
    pub project_id: Option<DbId>,
    pub task_id: Option<DbId>,
    pub current_step_id: DbId,
    pub started_by: DbId,
    pub notes: String,
}

/// Query parameters for `GET /workflow-instances`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowInstanceListParams {
    pub status: Option<String>,
    pub template_id: Option<DbId>,
    pub project_id: Option<DbId>,
    pub task_id: Option<DbId>,
    /// Keep only running instances whose current step is past its timeout.
    #[serde(default)]
    pub overdue: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// What a non-admin may list: instances they started, plus `approving`.
#[derive(Debug, Clone, Copy)]
pub struct MemberVisibility<'a> {
    pub user_id: DbId,
    /// Instances whose current step resolves the user as an approver.
    pub approving: &'a [DbId],
}

/// Timing facts of an instance's current step used to derive overdue status.
#[derive(Debug, Clone, FromRow)]
pub struct CurrentStepTiming {
    pub instance_id: DbId,
    pub timeout_hours: i32,
    pub step_started_at: Option<Timestamp>,
}

/// An instance with its derived timing fields.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowInstanceView {
    #[serde(flatten)]
    pub instance: WorkflowInstance,
    pub is_overdue: bool,
    pub duration_secs: i64,
}

impl WorkflowInstanceView {
    /// Derive timing fields at `now`.
    ///
    /// `timing` describes the current step; only running instances can be
    /// overdue.
    pub fn build(
        instance: WorkflowInstance,
        timing: Option<&CurrentStepTiming>,
        now: Timestamp,
    ) -> Self {
        let running = instance.status == InstanceStatus::Running.as_str();
        let is_overdue = running
            && timing.is_some_and(|t| {
                overdue::step_is_overdue(t.timeout_hours, t.step_started_at, now)
            });
        let duration_secs =
            overdue::elapsed(instance.started_at, instance.completed_at, now).num_seconds();
        Self {
            instance,
            is_overdue,
            duration_secs,
        }
    }
}

/// An instance with its current step and step-instance history.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowInstanceDetail {
    #[serde(flatten)]
    pub view: WorkflowInstanceView,
    pub current_step: Option<WorkflowStep>,
    pub step_instances: Vec<WorkflowStepInstanceView>,
}
