//! Workflow template registry.
//!
//! Templates are created together with their ordered steps and are
//! immutable in structure afterwards: only metadata and the active flag
//! change. Deactivation is the supported way to retire a template; a
//! template that any instance references cannot be deleted.

use serde_json::json;
use sqlx::PgPool;
use taskflow_core::error::CoreError;
use taskflow_core::types::DbId;
use taskflow_core::workflow::{
    validate_name, validate_step, validate_step_orders, ApproverType, StepCheck, StepType,
    TemplateCategory, DEFAULT_TIMEOUT_HOURS,
};
use taskflow_db::models::workflow_step::WorkflowStep;
use taskflow_db::models::workflow_template::{
    CreateWorkflowTemplate, UpdateWorkflowTemplate, WorkflowTemplate, WorkflowTemplateDetail,
    WorkflowTemplateListParams,
};
use taskflow_db::repositories::{WorkflowInstanceRepo, WorkflowStepRepo, WorkflowTemplateRepo};
use taskflow_events::names::{ENTITY_WORKFLOW_TEMPLATE, TEMPLATE_CREATED, TEMPLATE_DEACTIVATED};
use taskflow_events::{EventBus, PlatformEvent};
use validator::Validate;

use crate::engine::{parse_optional, Actor};
use crate::error::{AppError, AppResult};

/// Validate a template definition before anything is written.
///
/// Checks the name, the category, every step's type, approver strategy and
/// configuration, and that step orders are 1-based and unique.
pub fn validate_new_template(input: &CreateWorkflowTemplate) -> AppResult<()> {
    input.validate()?;
    validate_name("Template", &input.name)?;
    parse_optional::<TemplateCategory>(input.category.as_deref())?;

    let empty_config = json!({});
    for step in &input.steps {
        step.step_type.parse::<StepType>()?;
        let approver_type = parse_optional::<ApproverType>(step.approver_type.as_deref())?
            .unwrap_or(ApproverType::SpecificUser);
        validate_step(&StepCheck {
            name: &step.name,
            order: step.order,
            approver_type,
            config: step.config.as_ref().unwrap_or(&empty_config),
            approver_count: step.approver_ids.len(),
            timeout_hours: step.timeout_hours.unwrap_or(DEFAULT_TIMEOUT_HOURS),
        })?;
    }

    let orders: Vec<i32> = input.steps.iter().map(|s| s.order).collect();
    validate_step_orders(&orders)?;
    Ok(())
}

fn validate_update(input: &UpdateWorkflowTemplate) -> AppResult<()> {
    input.validate()?;
    if let Some(name) = &input.name {
        validate_name("Template", name)?;
    }
    parse_optional::<TemplateCategory>(input.category.as_deref())?;
    Ok(())
}

/// Whether `actor` may see `template`.
fn is_visible(actor: &Actor, template: &WorkflowTemplate) -> bool {
    actor.owns(template.created_by) || (template.is_public && template.is_active)
}

pub struct TemplateRegistry<'a> {
    pool: &'a PgPool,
    events: &'a EventBus,
}

impl<'a> TemplateRegistry<'a> {
    pub fn new(pool: &'a PgPool, events: &'a EventBus) -> Self {
        Self { pool, events }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        input: &CreateWorkflowTemplate,
    ) -> AppResult<WorkflowTemplateDetail> {
        validate_new_template(input)?;

        let detail = WorkflowTemplateRepo::create_with_steps(self.pool, actor.user_id, input).await?;

        tracing::info!(
            template_id = detail.template.id,
            step_count = detail.steps.len(),
            user_id = actor.user_id,
            "Workflow template created"
        );
        self.events.publish(
            PlatformEvent::new(TEMPLATE_CREATED)
                .with_source(ENTITY_WORKFLOW_TEMPLATE, detail.template.id)
                .with_actor(actor.user_id)
                .with_payload(json!({
                    "name": detail.template.name,
                    "step_count": detail.steps.len(),
                })),
        );

        Ok(detail)
    }

    /// A template visible to `actor`. Invisible templates are reported as
    /// not found.
    pub async fn get(&self, actor: &Actor, id: DbId) -> AppResult<WorkflowTemplate> {
        WorkflowTemplateRepo::find_by_id(self.pool, id)
            .await?
            .filter(|t| is_visible(actor, t))
            .ok_or_else(|| {
                AppError::Core(CoreError::NotFound {
                    entity: "WorkflowTemplate",
                    id,
                })
            })
    }

    pub async fn get_detail(&self, actor: &Actor, id: DbId) -> AppResult<WorkflowTemplateDetail> {
        let template = self.get(actor, id).await?;
        let steps = WorkflowStepRepo::list_for_template(self.pool, template.id).await?;
        Ok(WorkflowTemplateDetail { template, steps })
    }

    /// Steps in ascending order. Empty when the template has none.
    pub async fn get_ordered_steps(&self, actor: &Actor, id: DbId) -> AppResult<Vec<WorkflowStep>> {
        let template = self.get(actor, id).await?;
        Ok(WorkflowStepRepo::list_for_template(self.pool, template.id).await?)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        params: &WorkflowTemplateListParams,
    ) -> AppResult<Vec<WorkflowTemplate>> {
        parse_optional::<TemplateCategory>(params.category.as_deref())?;
        let viewer = (!actor.is_admin).then_some(actor.user_id);
        Ok(WorkflowTemplateRepo::list_visible(self.pool, viewer, params).await?)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: DbId,
        input: &UpdateWorkflowTemplate,
    ) -> AppResult<WorkflowTemplate> {
        validate_update(input)?;
        self.get_owned(actor, id).await?;

        let template = WorkflowTemplateRepo::update(self.pool, id, input)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "WorkflowTemplate",
                id,
            }))?;

        tracing::info!(template_id = id, user_id = actor.user_id, "Workflow template updated");
        Ok(template)
    }

    /// Hide a template from new instances. Running instances are unaffected.
    pub async fn deactivate(&self, actor: &Actor, id: DbId) -> AppResult<WorkflowTemplate> {
        let template = self.set_active(actor, id, false).await?;
        self.events.publish(
            PlatformEvent::new(TEMPLATE_DEACTIVATED)
                .with_source(ENTITY_WORKFLOW_TEMPLATE, id)
                .with_actor(actor.user_id),
        );
        Ok(template)
    }

    pub async fn activate(&self, actor: &Actor, id: DbId) -> AppResult<WorkflowTemplate> {
        self.set_active(actor, id, true).await
    }

    /// Delete a template that no instance references.
    pub async fn delete(&self, actor: &Actor, id: DbId) -> AppResult<()> {
        self.get_owned(actor, id).await?;

        let instances = WorkflowInstanceRepo::count_for_template(self.pool, id).await?;
        if instances > 0 {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "Workflow template {id} is referenced by {instances} instance(s); deactivate it instead"
            ))));
        }

        if !WorkflowTemplateRepo::delete(self.pool, id).await? {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "WorkflowTemplate",
                id,
            }));
        }

        tracing::info!(template_id = id, user_id = actor.user_id, "Workflow template deleted");
        Ok(())
    }

    async fn set_active(&self, actor: &Actor, id: DbId, is_active: bool) -> AppResult<WorkflowTemplate> {
        self.get_owned(actor, id).await?;

        let template = WorkflowTemplateRepo::set_active(self.pool, id, is_active)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "WorkflowTemplate",
                id,
            }))?;

        tracing::info!(
            template_id = id,
            is_active,
            user_id = actor.user_id,
            "Workflow template active flag changed"
        );
        Ok(template)
    }

    /// A template `actor` may modify: its creator or an admin.
    async fn get_owned(&self, actor: &Actor, id: DbId) -> AppResult<WorkflowTemplate> {
        let template = self.get(actor, id).await?;
        if !actor.owns(template.created_by) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Only the template's creator or an admin may modify it".into(),
            )));
        }
        Ok(template)
    }
}
