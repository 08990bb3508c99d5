//! Repository for the `workflow_templates` table.
//!
//! Templates are created together with their steps; see
//! [`WorkflowTemplateRepo::create_with_steps`].

use sqlx::{PgExecutor, PgPool};
use taskflow_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use taskflow_core::types::DbId;
use taskflow_core::workflow::{
    ApproverType, TemplateCategory, DEFAULT_TIMEOUT_HOURS,
};

use crate::models::workflow_template::{
    CreateWorkflowTemplate, UpdateWorkflowTemplate, WorkflowTemplate, WorkflowTemplateDetail,
    WorkflowTemplateListParams,
};
use crate::repositories::WorkflowStepRepo;

const COLUMNS: &str = "id, name, description, category, is_active, is_public, \
                        created_by, created_at, updated_at";

/// Provides CRUD operations for workflow templates.
pub struct WorkflowTemplateRepo;

impl WorkflowTemplateRepo {
    /// Insert a template and all of its steps (with explicit approvers) in
    /// one transaction.
    ///
    /// The input is expected to be validated already. A duplicate step order
    /// still fails on `uq_workflow_steps_template_order` and rolls the whole
    /// template back.
    pub async fn create_with_steps(
        pool: &PgPool,
        created_by: DbId,
        input: &CreateWorkflowTemplate,
    ) -> Result<WorkflowTemplateDetail, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO workflow_templates (name, description, category, is_public, created_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let template = sqlx::query_as::<_, WorkflowTemplate>(&query)
            .bind(input.name.trim())
            .bind(input.description.as_deref().unwrap_or(""))
            .bind(
                input
                    .category
                    .as_deref()
                    .unwrap_or(TemplateCategory::Custom.as_str()),
            )
            .bind(input.is_public.unwrap_or(false))
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

        for step in &input.steps {
            let step_id: DbId = sqlx::query_scalar(
                "INSERT INTO workflow_steps
                    (template_id, name, step_type, step_order, approver_type,
                     config, is_required, timeout_hours)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING id",
            )
            .bind(template.id)
            .bind(step.name.trim())
            .bind(&step.step_type)
            .bind(step.order)
            .bind(
                step.approver_type
                    .as_deref()
                    .unwrap_or(ApproverType::SpecificUser.as_str()),
            )
            .bind(
                step.config
                    .clone()
                    .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            )
            .bind(step.is_required.unwrap_or(true))
            .bind(step.timeout_hours.unwrap_or(DEFAULT_TIMEOUT_HOURS))
            .fetch_one(&mut *tx)
            .await?;

            if !step.approver_ids.is_empty() {
                sqlx::query(
                    "INSERT INTO workflow_step_approvers (step_id, user_id)
                     SELECT $1, UNNEST($2::BIGINT[])
                     ON CONFLICT (step_id, user_id) DO NOTHING",
                )
                .bind(step_id)
                .bind(&step.approver_ids)
                .execute(&mut *tx)
                .await?;
            }
        }

        let steps = WorkflowStepRepo::list_for_template(&mut *tx, template.id).await?;
        tx.commit().await?;

        Ok(WorkflowTemplateDetail { template, steps })
    }

    pub async fn find_by_id<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<WorkflowTemplate>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM workflow_templates WHERE id = $1");
        sqlx::query_as::<_, WorkflowTemplate>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List templates visible to a caller, ordered by name.
    ///
    /// `viewer = None` lists everything (admin view; inactive templates only
    /// with `include_inactive`). With a viewer, only active templates that
    /// are public or created by that user are returned.
    pub async fn list_visible(
        pool: &PgPool,
        viewer: Option<DbId>,
        params: &WorkflowTemplateListParams,
    ) -> Result<Vec<WorkflowTemplate>, sqlx::Error> {
        let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
        let offset = clamp_offset(params.offset);
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_templates
             WHERE ($1::BOOLEAN OR is_active)
               AND ($2::TEXT IS NULL OR category = $2)
               AND ($3::BIGINT IS NULL OR (is_active AND (is_public OR created_by = $3)))
             ORDER BY name, id
             LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, WorkflowTemplate>(&query)
            .bind(params.include_inactive)
            .bind(&params.category)
            .bind(viewer)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Update template metadata. Only non-`None` fields are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateWorkflowTemplate,
    ) -> Result<Option<WorkflowTemplate>, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_templates SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                is_public = COALESCE($5, is_public),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowTemplate>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(&input.category)
            .bind(input.is_public)
            .fetch_optional(pool)
            .await
    }

    /// Set the active flag. In-flight instances are unaffected.
    pub async fn set_active(
        pool: &PgPool,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<WorkflowTemplate>, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_templates SET is_active = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowTemplate>(&query)
            .bind(id)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }

    /// Delete a template and, by cascade, its steps.
    ///
    /// Fails on `fk_workflow_instances_template` while instances reference
    /// it. Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflow_templates WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
