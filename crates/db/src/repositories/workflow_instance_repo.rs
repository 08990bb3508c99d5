//! Repository for the `workflow_instances` table.
//!
//! State-changing methods take `&mut PgConnection` so the engine can run
//! them inside one transaction after locking the row with
//! [`WorkflowInstanceRepo::lock`].

use sqlx::{PgConnection, PgExecutor, PgPool};
use taskflow_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use taskflow_core::types::DbId;
use taskflow_core::workflow::{InstanceResult, InstanceStatus};

use crate::models::workflow_instance::{
    CurrentStepTiming, MemberVisibility, NewWorkflowInstance, WorkflowInstance,
    WorkflowInstanceListParams,
};

const COLUMNS: &str = "id, template_id, name, status, project_id, task_id, current_step_id, \
                        started_by, started_at, completed_at, result, notes, created_at, updated_at";

/// Provides persistence for workflow instances.
pub struct WorkflowInstanceRepo;

impl WorkflowInstanceRepo {
    /// Insert a new running instance positioned on its first step.
    pub async fn create(
        conn: &mut PgConnection,
        input: &NewWorkflowInstance,
    ) -> Result<WorkflowInstance, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflow_instances
                (template_id, name, status, project_id, task_id, current_step_id, started_by, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(input.template_id)
            .bind(&input.name)
            .bind(InstanceStatus::Running.as_str())
            .bind(input.project_id)
            .bind(input.task_id)
            .bind(input.current_step_id)
            .bind(input.started_by)
            .bind(&input.notes)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<WorkflowInstance>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM workflow_instances WHERE id = $1");
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Load an instance and hold a row lock until the transaction ends.
    pub async fn lock(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<WorkflowInstance>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflow_instances WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Move a running instance to `step_id`.
    pub async fn set_current_step(
        conn: &mut PgConnection,
        id: DbId,
        step_id: DbId,
    ) -> Result<WorkflowInstance, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_instances SET current_step_id = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(id)
            .bind(step_id)
            .fetch_one(conn)
            .await
    }

    /// Put an instance into a terminal state with `completed_at = now`.
    ///
    /// `current_step_id` is kept so the final step stays visible.
    pub async fn finish(
        conn: &mut PgConnection,
        id: DbId,
        status: InstanceStatus,
        result: InstanceResult,
    ) -> Result<WorkflowInstance, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_instances SET
                status = $2,
                result = $3,
                completed_at = NOW(),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(id)
            .bind(status.as_str())
            .bind(result.as_str())
            .fetch_one(conn)
            .await
    }

    /// List instances, newest first.
    ///
    /// `visibility` restricts a member's list to instances they started
    /// plus the ids they approve. The `overdue` parameter is evaluated by the caller from
    /// [`Self::current_step_timings`], not here.
    pub async fn list(
        pool: &PgPool,
        visibility: Option<MemberVisibility<'_>>,
        params: &WorkflowInstanceListParams,
    ) -> Result<Vec<WorkflowInstance>, sqlx::Error> {
        let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
        let offset = clamp_offset(params.offset);
        let (member, approving): (Option<DbId>, &[DbId]) = match visibility {
            Some(v) => (Some(v.user_id), v.approving),
            None => (None, &[]),
        };
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_instances
             WHERE ($1::BIGINT IS NULL OR started_by = $1 OR id = ANY($8))
               AND ($2::TEXT IS NULL OR status = $2)
               AND ($3::BIGINT IS NULL OR template_id = $3)
               AND ($4::BIGINT IS NULL OR project_id = $4)
               AND ($5::BIGINT IS NULL OR task_id = $5)
             ORDER BY started_at DESC, id DESC
             LIMIT $6 OFFSET $7"
        );
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(member)
            .bind(&params.status)
            .bind(params.template_id)
            .bind(params.project_id)
            .bind(params.task_id)
            .bind(limit)
            .bind(offset)
            .bind(approving)
            .fetch_all(pool)
            .await
    }

    /// Instances matching the list filters that `user_id` did not start
    /// and that still point at a step. The caller decides which of them
    /// the user approves.
    pub async fn list_approval_candidates(
        pool: &PgPool,
        user_id: DbId,
        params: &WorkflowInstanceListParams,
    ) -> Result<Vec<WorkflowInstance>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_instances
             WHERE started_by <> $1
               AND current_step_id IS NOT NULL
               AND ($2::TEXT IS NULL OR status = $2)
               AND ($3::BIGINT IS NULL OR template_id = $3)
               AND ($4::BIGINT IS NULL OR project_id = $4)
               AND ($5::BIGINT IS NULL OR task_id = $5)
             ORDER BY id"
        );
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(user_id)
            .bind(&params.status)
            .bind(params.template_id)
            .bind(params.project_id)
            .bind(params.task_id)
            .fetch_all(pool)
            .await
    }

    pub async fn current_step_timings(
        pool: &PgPool,
        instance_ids: &[DbId],
    ) -> Result<Vec<CurrentStepTiming>, sqlx::Error> {
        sqlx::query_as::<_, CurrentStepTiming>(
            "SELECT i.id AS instance_id, s.timeout_hours, si.started_at AS step_started_at
             FROM workflow_instances i
             JOIN workflow_steps s ON s.id = i.current_step_id
             LEFT JOIN workflow_step_instances si
                ON si.instance_id = i.id AND si.step_id = i.current_step_id
             WHERE i.id = ANY($1)",
        )
        .bind(instance_ids)
        .fetch_all(pool)
        .await
    }

    /// Number of instances created from a template.
    pub async fn count_for_template(pool: &PgPool, template_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM workflow_instances WHERE template_id = $1")
            .bind(template_id)
            .fetch_one(pool)
            .await
    }
}
