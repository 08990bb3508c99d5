//! Repository for the `workflow_step_instances` table.
//!
//! At most one step instance exists per (instance, step); a second insert
//! fails on `uq_workflow_step_instances_instance_step`.

use sqlx::{PgConnection, PgExecutor};
use taskflow_core::types::DbId;
use taskflow_core::workflow::{StepInstanceStatus, StepOutcome};

use crate::models::workflow_step_instance::{StepInstanceWithStep, WorkflowStepInstance};

const COLUMNS: &str = "id, instance_id, step_id, status, assigned_to, started_at, completed_at, \
                        completed_by, result, comments, created_at, updated_at";

/// Provides persistence for step instances.
pub struct WorkflowStepInstanceRepo;

impl WorkflowStepInstanceRepo {
    /// Create the pending step instance for a step the instance just reached.
    pub async fn create(
        conn: &mut PgConnection,
        instance_id: DbId,
        step_id: DbId,
    ) -> Result<WorkflowStepInstance, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflow_step_instances (instance_id, step_id, status, started_at)
             VALUES ($1, $2, $3, NOW())
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowStepInstance>(&query)
            .bind(instance_id)
            .bind(step_id)
            .bind(StepInstanceStatus::Pending.as_str())
            .fetch_one(conn)
            .await
    }

    /// Load the step instance for (instance, step) with a row lock.
    pub async fn lock_for_step(
        conn: &mut PgConnection,
        instance_id: DbId,
        step_id: DbId,
    ) -> Result<Option<WorkflowStepInstance>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_step_instances
             WHERE instance_id = $1 AND step_id = $2
             FOR UPDATE"
        );
        sqlx::query_as::<_, WorkflowStepInstance>(&query)
            .bind(instance_id)
            .bind(step_id)
            .fetch_optional(conn)
            .await
    }

    /// Move a pending step instance to `in_progress`, assigned to `user_id`.
    pub async fn begin(
        conn: &mut PgConnection,
        id: DbId,
        user_id: DbId,
    ) -> Result<WorkflowStepInstance, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_step_instances SET
                status = $2,
                assigned_to = $3,
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowStepInstance>(&query)
            .bind(id)
            .bind(StepInstanceStatus::InProgress.as_str())
            .bind(user_id)
            .fetch_one(conn)
            .await
    }

    /// Record the outcome of a step instance.
    pub async fn complete(
        conn: &mut PgConnection,
        id: DbId,
        status: StepInstanceStatus,
        outcome: StepOutcome,
        comments: &str,
        completed_by: DbId,
    ) -> Result<WorkflowStepInstance, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_step_instances SET
                status = $2,
                result = $3,
                comments = $4,
                completed_by = $5,
                completed_at = NOW(),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowStepInstance>(&query)
            .bind(id)
            .bind(status.as_str())
            .bind(outcome.as_str())
            .bind(comments)
            .bind(completed_by)
            .fetch_one(conn)
            .await
    }

    /// Close every open step instance of a cancelled workflow instance.
    ///
    /// Returns the number of step instances cancelled.
    pub async fn cancel_open(
        conn: &mut PgConnection,
        instance_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflow_step_instances SET
                status = $2,
                completed_at = NOW(),
                updated_at = NOW()
             WHERE instance_id = $1 AND status IN ($3, $4)",
        )
        .bind(instance_id)
        .bind(StepInstanceStatus::Cancelled.as_str())
        .bind(StepInstanceStatus::Pending.as_str())
        .bind(StepInstanceStatus::InProgress.as_str())
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Step instances of a workflow instance with their step name and order,
    /// in step order.
    pub async fn list_for_instance<'e, E>(
        executor: E,
        instance_id: DbId,
    ) -> Result<Vec<StepInstanceWithStep>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, StepInstanceWithStep>(
            "SELECT si.id, si.instance_id, si.step_id, si.status, si.assigned_to,
                    si.started_at, si.completed_at, si.completed_by, si.result, si.comments,
                    si.created_at, si.updated_at,
                    s.name AS step_name, s.step_order
             FROM workflow_step_instances si
             JOIN workflow_steps s ON s.id = si.step_id
             WHERE si.instance_id = $1
             ORDER BY s.step_order ASC",
        )
        .bind(instance_id)
        .fetch_all(executor)
        .await
    }
}
