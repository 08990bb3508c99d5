//! Repository for the `workflow_steps` table.
//!
//! Steps are inserted by [`WorkflowTemplateRepo::create_with_steps`] and
//! never modified afterwards, so this repository is read-only.
//!
//! [`WorkflowTemplateRepo::create_with_steps`]: crate::repositories::WorkflowTemplateRepo::create_with_steps

use sqlx::PgExecutor;
use taskflow_core::types::DbId;

use crate::models::workflow_step::WorkflowStep;

/// Step columns (alias `s`) plus the explicit approver ids, ascending.
const COLUMNS: &str = "s.id, s.template_id, s.name, s.step_type, s.step_order, \
    s.approver_type, s.config, s.is_required, s.timeout_hours, \
    ARRAY(SELECT a.user_id FROM workflow_step_approvers a \
          WHERE a.step_id = s.id ORDER BY a.user_id) AS approver_ids, \
    s.created_at, s.updated_at";

/// Provides read operations for workflow steps.
pub struct WorkflowStepRepo;

impl WorkflowStepRepo {
    /// Steps of a template in execution order. Empty if the template has
    /// none (or does not exist).
    pub async fn list_for_template<'e, E>(
        executor: E,
        template_id: DbId,
    ) -> Result<Vec<WorkflowStep>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_steps s
             WHERE s.template_id = $1
             ORDER BY s.step_order ASC"
        );
        sqlx::query_as::<_, WorkflowStep>(&query)
            .bind(template_id)
            .fetch_all(executor)
            .await
    }

    /// Find a step by ID within a specific template.
    pub async fn find_in_template<'e, E>(
        executor: E,
        template_id: DbId,
        step_id: DbId,
    ) -> Result<Option<WorkflowStep>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_steps s
             WHERE s.id = $1 AND s.template_id = $2"
        );
        sqlx::query_as::<_, WorkflowStep>(&query)
            .bind(step_id)
            .bind(template_id)
            .fetch_optional(executor)
            .await
    }
}
