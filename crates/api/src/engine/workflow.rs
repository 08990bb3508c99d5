//! Workflow instance engine.
//!
//! An instance walks its template's steps in ascending order, one current
//! step at a time. Each step gets exactly one step instance, created when
//! the step is reached. The decision of what a completion does is made by
//! [`plan_step_completion`]; this module loads the locked rows, asks the
//! planner, and persists the plan.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use taskflow_core::approval_request::status_for_instance;
use taskflow_core::approvers::{resolve_approvers, ApproverStep, ResolutionTarget};
use taskflow_core::error::CoreError;
use taskflow_core::types::DbId;
use taskflow_core::workflow::{
    ensure_current_step, ensure_running, first_step, next_step, plan_step_completion,
    validate_can_begin, validate_can_cancel, validate_can_start, validate_name, CompletionInput,
    InstanceAdvance, InstanceResult, InstanceStatus, StepInstanceStatus, StepOutcome,
    StepPosition,
};
use taskflow_db::directory::PgApproverDirectory;
use taskflow_db::models::approval_request::ApprovalRequest;
use taskflow_db::models::workflow_instance::{
    MemberVisibility, NewWorkflowInstance, StartWorkflowInstance, WorkflowInstance,
    WorkflowInstanceDetail, WorkflowInstanceListParams, WorkflowInstanceView,
};
use taskflow_db::models::workflow_step::WorkflowStep;
use taskflow_db::models::workflow_step_instance::{
    CompleteStepRequest, WorkflowStepInstance, WorkflowStepInstanceView,
};
use taskflow_db::repositories::{
    ApprovalRequestRepo, ProjectRepo, TaskRepo, WorkflowInstanceRepo, WorkflowStepInstanceRepo,
    WorkflowStepRepo, WorkflowTemplateRepo,
};
use taskflow_events::names::{
    instance_finished_event, request_status_event, ENTITY_APPROVAL_REQUEST,
    ENTITY_WORKFLOW_INSTANCE, WORKFLOW_STARTED, WORKFLOW_STEP_COMPLETED, WORKFLOW_STEP_STARTED,
};
use taskflow_events::{EventBus, PlatformEvent};

use crate::engine::{parse_optional, parse_stored, Actor};
use crate::error::{AppError, AppResult};

fn instance_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "WorkflowInstance",
        id,
    })
}

fn step_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "WorkflowStep",
        id,
    })
}

fn instance_status(instance: &WorkflowInstance) -> Result<InstanceStatus, CoreError> {
    parse_stored("workflow_instances.status", &instance.status)
}

fn instance_result(instance: &WorkflowInstance) -> Result<Option<InstanceResult>, CoreError> {
    instance
        .result
        .as_deref()
        .map(|r| parse_stored("workflow_instances.result", r))
        .transpose()
}

fn target_of(instance: &WorkflowInstance) -> ResolutionTarget {
    ResolutionTarget {
        project_id: instance.project_id,
        task_id: instance.task_id,
    }
}

/// Move the requests attached to a finished instance to the status the
/// instance imposes.
///
/// Runs on the caller's transaction. Returns the updated requests; empty
/// when the outcome imposes no status (errors are left for a human).
pub(crate) async fn sync_attached_requests(
    conn: &mut PgConnection,
    instance_id: DbId,
    status: InstanceStatus,
    result: Option<InstanceResult>,
) -> Result<Vec<ApprovalRequest>, sqlx::Error> {
    match status_for_instance(status, result) {
        Some(target) => ApprovalRequestRepo::sync_with_instance(conn, instance_id, target).await,
        None => Ok(Vec::new()),
    }
}

/// Status-change events for requests updated by [`sync_attached_requests`].
pub(crate) fn synced_request_events(
    requests: &[ApprovalRequest],
    instance_id: DbId,
    actor_id: DbId,
) -> Vec<PlatformEvent> {
    requests
        .iter()
        .filter_map(|request| {
            let status = request.status.parse().ok()?;
            let event_type = request_status_event(status)?;
            Some(
                PlatformEvent::new(event_type)
                    .with_source(ENTITY_APPROVAL_REQUEST, request.id)
                    .with_actor(actor_id)
                    .with_payload(json!({ "workflow_instance_id": instance_id })),
            )
        })
        .collect()
}

pub struct WorkflowEngine<'a> {
    pool: &'a PgPool,
    events: &'a EventBus,
}

impl<'a> WorkflowEngine<'a> {
    pub fn new(pool: &'a PgPool, events: &'a EventBus) -> Self {
        Self { pool, events }
    }

    /// Start an instance of a template on its first step.
    ///
    /// A task without a project fills the project from the task; a task in
    /// a different project than the one given is rejected.
    pub async fn start(
        &self,
        actor: &Actor,
        input: &StartWorkflowInstance,
    ) -> AppResult<WorkflowInstanceDetail> {
        let template = WorkflowTemplateRepo::find_by_id(self.pool, input.template_id)
            .await?
            .filter(|t| actor.owns(t.created_by) || t.is_public)
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "WorkflowTemplate",
                id: input.template_id,
            }))?;

        let steps = WorkflowStepRepo::list_for_template(self.pool, template.id).await?;
        validate_can_start(template.id, template.is_active, steps.len())?;
        let positions: Vec<StepPosition> = steps.iter().map(WorkflowStep::position).collect();
        let first = first_step(&positions).ok_or_else(|| {
            CoreError::Configuration(format!("Workflow template {} has no steps", template.id))
        })?;

        let project_id = self.resolve_target(input.project_id, input.task_id).await?;

        let name = match input.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => template.name.clone(),
        };
        validate_name("Instance", &name)?;

        let mut tx = self.pool.begin().await?;
        let instance = WorkflowInstanceRepo::create(
            &mut tx,
            &NewWorkflowInstance {
                template_id: template.id,
                name,
                project_id,
                task_id: input.task_id,
                current_step_id: first.id,
                started_by: actor.user_id,
                notes: input.notes.clone().unwrap_or_default(),
            },
        )
        .await?;
        WorkflowStepInstanceRepo::create(&mut tx, instance.id, first.id).await?;
        tx.commit().await?;

        tracing::info!(
            instance_id = instance.id,
            template_id = template.id,
            step_id = first.id,
            user_id = actor.user_id,
            "Workflow instance started"
        );
        self.events.publish(
            PlatformEvent::new(WORKFLOW_STARTED)
                .with_source(ENTITY_WORKFLOW_INSTANCE, instance.id)
                .with_actor(actor.user_id)
                .with_payload(json!({
                    "template_id": template.id,
                    "current_step_id": first.id,
                })),
        );

        self.detail(instance).await
    }

    async fn resolve_target(
        &self,
        project_id: Option<DbId>,
        task_id: Option<DbId>,
    ) -> AppResult<Option<DbId>> {
        if let Some(task_id) = task_id {
            let task = TaskRepo::find_by_id(self.pool, task_id)
                .await?
                .ok_or(AppError::Core(CoreError::NotFound {
                    entity: "Task",
                    id: task_id,
                }))?;
            return match project_id {
                Some(project_id) if project_id != task.project_id => {
                    Err(AppError::Core(CoreError::Validation(format!(
                        "Task {task_id} belongs to project {}, not project {project_id}",
                        task.project_id
                    ))))
                }
                _ => Ok(Some(task.project_id)),
            };
        }

        if let Some(project_id) = project_id {
            ProjectRepo::find_by_id(self.pool, project_id)
                .await?
                .ok_or(AppError::Core(CoreError::NotFound {
                    entity: "Project",
                    id: project_id,
                }))?;
        }
        Ok(project_id)
    }

    /// Claim the current step: pending -> in_progress, assigned to the actor.
    pub async fn begin_step(
        &self,
        actor: &Actor,
        instance_id: DbId,
        step_id: DbId,
    ) -> AppResult<WorkflowStepInstance> {
        let mut tx = self.pool.begin().await?;

        let instance = WorkflowInstanceRepo::lock(&mut tx, instance_id)
            .await?
            .ok_or_else(|| instance_not_found(instance_id))?;
        let status = instance_status(&instance)?;
        ensure_running(instance.id, status)?;
        ensure_current_step(instance.id, instance.current_step_id, step_id)?;

        let step_instance = WorkflowStepInstanceRepo::lock_for_step(&mut tx, instance.id, step_id)
            .await?
            .ok_or_else(|| step_not_found(step_id))?;
        let step_status: StepInstanceStatus =
            parse_stored("workflow_step_instances.status", &step_instance.status)?;
        validate_can_begin(status, step_status, instance.id)?;

        let step = WorkflowStepRepo::find_in_template(&mut *tx, instance.template_id, step_id)
            .await?
            .ok_or_else(|| step_not_found(step_id))?;
        self.authorize(actor, &instance, &step).await?;

        let step_instance =
            WorkflowStepInstanceRepo::begin(&mut tx, step_instance.id, actor.user_id).await?;
        tx.commit().await?;

        tracing::info!(
            instance_id,
            step_id,
            user_id = actor.user_id,
            "Workflow step started"
        );
        self.events.publish(
            PlatformEvent::new(WORKFLOW_STEP_STARTED)
                .with_source(ENTITY_WORKFLOW_INSTANCE, instance_id)
                .with_actor(actor.user_id)
                .with_payload(json!({ "step_id": step_id })),
        );

        Ok(step_instance)
    }

    /// Record the outcome of the current step and advance or finish the
    /// instance. Attached approval requests follow a finished instance in
    /// the same transaction.
    pub async fn complete_step(
        &self,
        actor: &Actor,
        instance_id: DbId,
        step_id: DbId,
        input: &CompleteStepRequest,
    ) -> AppResult<WorkflowInstanceDetail> {
        let outcome: StepOutcome = input.outcome.parse()?;

        let mut tx = self.pool.begin().await?;

        let instance = WorkflowInstanceRepo::lock(&mut tx, instance_id)
            .await?
            .ok_or_else(|| instance_not_found(instance_id))?;
        let status = instance_status(&instance)?;
        ensure_running(instance.id, status)?;
        ensure_current_step(instance.id, instance.current_step_id, step_id)?;

        let step_instance = WorkflowStepInstanceRepo::lock_for_step(&mut tx, instance.id, step_id)
            .await?
            .ok_or_else(|| step_not_found(step_id))?;
        let step_status: StepInstanceStatus =
            parse_stored("workflow_step_instances.status", &step_instance.status)?;

        let steps = WorkflowStepRepo::list_for_template(&mut *tx, instance.template_id).await?;
        let step = steps
            .iter()
            .find(|s| s.id == step_id)
            .ok_or_else(|| step_not_found(step_id))?;
        self.authorize(actor, &instance, step).await?;

        let positions: Vec<StepPosition> = steps.iter().map(WorkflowStep::position).collect();
        let plan = plan_step_completion(
            instance.id,
            &CompletionInput {
                instance_status: status,
                step_status,
                outcome,
                step_required: step.is_required,
                next_step: next_step(&positions, step.step_order),
            },
        )?;

        WorkflowStepInstanceRepo::complete(
            &mut tx,
            step_instance.id,
            plan.step_status,
            outcome,
            &input.comments,
            actor.user_id,
        )
        .await?;

        let mut events = vec![PlatformEvent::new(WORKFLOW_STEP_COMPLETED)
            .with_source(ENTITY_WORKFLOW_INSTANCE, instance.id)
            .with_actor(actor.user_id)
            .with_payload(json!({
                "step_id": step_id,
                "outcome": outcome,
            }))];

        let instance = match plan.advance {
            InstanceAdvance::MoveTo { step_id: next_id } => {
                let instance =
                    WorkflowInstanceRepo::set_current_step(&mut tx, instance.id, next_id).await?;
                WorkflowStepInstanceRepo::create(&mut tx, instance.id, next_id).await?;
                instance
            }
            InstanceAdvance::Finish { status, result } => {
                let instance =
                    WorkflowInstanceRepo::finish(&mut tx, instance.id, status, result).await?;
                let synced =
                    sync_attached_requests(&mut tx, instance.id, status, Some(result)).await?;
                events.push(
                    PlatformEvent::new(instance_finished_event(status))
                        .with_source(ENTITY_WORKFLOW_INSTANCE, instance.id)
                        .with_actor(actor.user_id)
                        .with_payload(json!({
                            "status": status,
                            "result": result,
                            "synced_requests": synced.iter().map(|r| r.id).collect::<Vec<_>>(),
                        })),
                );
                events.extend(synced_request_events(&synced, instance.id, actor.user_id));
                instance
            }
        };

        tx.commit().await?;

        tracing::info!(
            instance_id,
            step_id,
            outcome = %outcome,
            status = %instance.status,
            current_step_id = ?instance.current_step_id,
            user_id = actor.user_id,
            "Workflow step completed"
        );
        for event in events {
            self.events.publish(event);
        }

        self.detail(instance).await
    }

    /// Cancel a running instance. Its open step instance is closed as
    /// cancelled and attached requests are cancelled with it.
    pub async fn cancel(&self, actor: &Actor, instance_id: DbId) -> AppResult<WorkflowInstanceDetail> {
        let mut tx = self.pool.begin().await?;

        let instance = WorkflowInstanceRepo::lock(&mut tx, instance_id)
            .await?
            .ok_or_else(|| instance_not_found(instance_id))?;
        if !actor.owns(instance.started_by) {
            if !self.approves_current_step(actor, &instance).await? {
                return Err(instance_not_found(instance_id));
            }
            return Err(AppError::Core(CoreError::Forbidden(
                "Only the user who started the workflow or an admin may cancel it".into(),
            )));
        }
        validate_can_cancel(instance.id, instance_status(&instance)?)?;

        let instance = WorkflowInstanceRepo::finish(
            &mut tx,
            instance.id,
            InstanceStatus::Cancelled,
            InstanceResult::Cancelled,
        )
        .await?;
        let closed_steps = WorkflowStepInstanceRepo::cancel_open(&mut tx, instance.id).await?;
        let synced = sync_attached_requests(
            &mut tx,
            instance.id,
            InstanceStatus::Cancelled,
            Some(InstanceResult::Cancelled),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            instance_id,
            closed_steps,
            synced_requests = synced.len(),
            user_id = actor.user_id,
            "Workflow instance cancelled"
        );
        self.events.publish(
            PlatformEvent::new(instance_finished_event(InstanceStatus::Cancelled))
                .with_source(ENTITY_WORKFLOW_INSTANCE, instance.id)
                .with_actor(actor.user_id),
        );
        for event in synced_request_events(&synced, instance.id, actor.user_id) {
            self.events.publish(event);
        }

        self.detail(instance).await
    }

    /// Users allowed to act on a step of an instance.
    pub async fn approvers(
        &self,
        actor: &Actor,
        instance_id: DbId,
        step_id: DbId,
    ) -> AppResult<Vec<DbId>> {
        let instance = self.find_visible(actor, instance_id).await?;
        let step = WorkflowStepRepo::find_in_template(self.pool, instance.template_id, step_id)
            .await?
            .ok_or_else(|| step_not_found(step_id))?;
        Ok(self.resolve(&instance, &step).await?)
    }

    pub async fn get(&self, actor: &Actor, instance_id: DbId) -> AppResult<WorkflowInstanceDetail> {
        let instance = self.find_visible(actor, instance_id).await?;
        self.detail(instance).await
    }

    /// Instances visible to `actor`, under the same rule as [`Self::get`].
    /// `overdue=true` keeps running instances whose current step is past
    /// its timeout.
    pub async fn list(
        &self,
        actor: &Actor,
        params: &WorkflowInstanceListParams,
    ) -> AppResult<Vec<WorkflowInstanceView>> {
        parse_optional::<InstanceStatus>(params.status.as_deref())?;

        let instances = if actor.is_admin {
            WorkflowInstanceRepo::list(self.pool, None, params).await?
        } else {
            let candidates =
                WorkflowInstanceRepo::list_approval_candidates(self.pool, actor.user_id, params)
                    .await?;
            let mut approving = Vec::new();
            for instance in &candidates {
                if self.approves_current_step(actor, instance).await? {
                    approving.push(instance.id);
                }
            }
            let visibility = MemberVisibility {
                user_id: actor.user_id,
                approving: &approving,
            };
            WorkflowInstanceRepo::list(self.pool, Some(visibility), params).await?
        };
        let ids: Vec<DbId> = instances.iter().map(|i| i.id).collect();
        let timings: HashMap<DbId, _> =
            WorkflowInstanceRepo::current_step_timings(self.pool, &ids)
                .await?
                .into_iter()
                .map(|t| (t.instance_id, t))
                .collect();

        let now = Utc::now();
        let mut views: Vec<WorkflowInstanceView> = instances
            .into_iter()
            .map(|instance| {
                let timing = timings.get(&instance.id);
                WorkflowInstanceView::build(instance, timing, now)
            })
            .collect();
        if params.overdue {
            views.retain(|v| v.is_overdue);
        }
        Ok(views)
    }

    /// Admins, the starter, and approvers of the current step may see an
    /// instance. Others get not-found.
    async fn find_visible(&self, actor: &Actor, instance_id: DbId) -> AppResult<WorkflowInstance> {
        let instance = WorkflowInstanceRepo::find_by_id(self.pool, instance_id)
            .await?
            .ok_or_else(|| instance_not_found(instance_id))?;
        if actor.owns(instance.started_by) || self.approves_current_step(actor, &instance).await? {
            Ok(instance)
        } else {
            Err(instance_not_found(instance_id))
        }
    }

    /// Whether the current step resolves `actor` as an approver. A step
    /// whose strategy cannot be resolved approves nobody.
    async fn approves_current_step(
        &self,
        actor: &Actor,
        instance: &WorkflowInstance,
    ) -> AppResult<bool> {
        let Some(current_step_id) = instance.current_step_id else {
            return Ok(false);
        };
        let Some(step) =
            WorkflowStepRepo::find_in_template(self.pool, instance.template_id, current_step_id)
                .await?
        else {
            return Ok(false);
        };
        match self.resolve(instance, &step).await {
            Ok(approvers) => Ok(approvers.contains(&actor.user_id)),
            Err(AppError::Core(CoreError::Resolution(_))) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Admins may act on any step; everyone else must resolve as an
    /// approver of it.
    async fn authorize(
        &self,
        actor: &Actor,
        instance: &WorkflowInstance,
        step: &WorkflowStep,
    ) -> AppResult<()> {
        if actor.is_admin {
            return Ok(());
        }
        let approvers = self.resolve(instance, step).await?;
        if !approvers.contains(&actor.user_id) {
            return Err(AppError::Core(CoreError::Forbidden(format!(
                "User {} is not an approver of step {}",
                actor.user_id, step.id
            ))));
        }
        Ok(())
    }

    async fn resolve(&self, instance: &WorkflowInstance, step: &WorkflowStep) -> AppResult<Vec<DbId>> {
        let approver_step = ApproverStep {
            step_id: step.id,
            approver_type: parse_stored("workflow_steps.approver_type", &step.approver_type)?,
            config: &step.config,
            approver_ids: &step.approver_ids,
        };
        let directory = PgApproverDirectory::new(self.pool);
        Ok(resolve_approvers(&directory, &approver_step, target_of(instance)).await?)
    }

    async fn detail(&self, instance: WorkflowInstance) -> AppResult<WorkflowInstanceDetail> {
        let now = Utc::now();

        let timings = WorkflowInstanceRepo::current_step_timings(self.pool, &[instance.id]).await?;
        let current_step = match instance.current_step_id {
            Some(step_id) => {
                WorkflowStepRepo::find_in_template(self.pool, instance.template_id, step_id)
                    .await?
            }
            None => None,
        };
        let step_instances = WorkflowStepInstanceRepo::list_for_instance(self.pool, instance.id)
            .await?
            .into_iter()
            .map(|row| WorkflowStepInstanceView::build(row, now))
            .collect();

        Ok(WorkflowInstanceDetail {
            view: WorkflowInstanceView::build(instance, timings.first(), now),
            current_step,
            step_instances,
        })
    }
}

/// Status and result of a stored instance, for callers outside the engine
/// that need to react to a finished instance.
pub(crate) fn finished_state(
    instance: &WorkflowInstance,
) -> Result<Option<(InstanceStatus, Option<InstanceResult>)>, CoreError> {
    let status = instance_status(instance)?;
    if !status.is_terminal() {
        return Ok(None);
    }
    Ok(Some((status, instance_result(instance)?)))
}
