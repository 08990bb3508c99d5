//! Approval request manager.
//!
//! A request has its own status lifecycle (see
//! [`taskflow_core::approval_request`]). When a workflow instance is
//! attached, the instance decides the outcome: manual approve/reject is
//! refused while it runs and the request follows the instance when it
//! finishes. An instance that ends in `error` leaves the request open for a
//! human decision.

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use taskflow_core::approval_request::{
    validate_can_attach, validate_can_edit, validate_title, validate_transition, RequestPriority,
    RequestStatus, RequestType,
};
use taskflow_core::error::CoreError;
use taskflow_core::types::DbId;
use taskflow_db::models::approval_request::{
    ApprovalRequest, ApprovalRequestListParams, ApprovalRequestView, CreateApprovalRequest,
    UpdateApprovalRequest,
};
use taskflow_db::repositories::{ApprovalRequestRepo, ProjectRepo, TaskRepo, WorkflowInstanceRepo};
use taskflow_events::names::{
    request_status_event, ENTITY_APPROVAL_REQUEST, REQUEST_CREATED, REQUEST_WORKFLOW_ATTACHED,
};
use taskflow_events::{EventBus, PlatformEvent};
use validator::Validate;

use crate::engine::workflow::{finished_state, sync_attached_requests, synced_request_events};
use crate::engine::{parse_optional, parse_stored, Actor};
use crate::error::{AppError, AppResult};

fn request_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "ApprovalRequest",
        id,
    })
}

fn request_status(request: &ApprovalRequest) -> Result<RequestStatus, CoreError> {
    parse_stored("approval_requests.status", &request.status)
}

/// Who may move a request to a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permission {
    RequesterOrAdmin,
    AdminOnly,
}

impl Permission {
    fn check(self, actor: &Actor, request: &ApprovalRequest) -> Result<(), CoreError> {
        let allowed = match self {
            Permission::RequesterOrAdmin => actor.owns(request.requester_id),
            Permission::AdminOnly => actor.is_admin,
        };
        if allowed {
            Ok(())
        } else {
            Err(CoreError::Forbidden(match self {
                Permission::RequesterOrAdmin => {
                    "Only the requester or an admin may do this".to_string()
                }
                Permission::AdminOnly => "Admin role required".to_string(),
            }))
        }
    }
}

pub struct ApprovalRequestManager<'a> {
    pool: &'a PgPool,
    events: &'a EventBus,
}

impl<'a> ApprovalRequestManager<'a> {
    pub fn new(pool: &'a PgPool, events: &'a EventBus) -> Self {
        Self { pool, events }
    }

    /// Create a draft request owned by `actor`.
    pub async fn create(
        &self,
        actor: &Actor,
        input: &CreateApprovalRequest,
    ) -> AppResult<ApprovalRequestView> {
        input.validate()?;
        validate_title(&input.title)?;
        input.request_type.parse::<RequestType>()?;
        parse_optional::<RequestPriority>(input.priority.as_deref())?;

        let mut input = input.clone();
        if let Some(task_id) = input.task_id {
            let task = TaskRepo::find_by_id(self.pool, task_id)
                .await?
                .ok_or(AppError::Core(CoreError::NotFound {
                    entity: "Task",
                    id: task_id,
                }))?;
            match input.project_id {
                Some(project_id) if project_id != task.project_id => {
                    return Err(AppError::Core(CoreError::Validation(format!(
                        "Task {task_id} belongs to project {}, not project {project_id}",
                        task.project_id
                    ))));
                }
                _ => input.project_id = Some(task.project_id),
            }
        } else if let Some(project_id) = input.project_id {
            ProjectRepo::find_by_id(self.pool, project_id)
                .await?
                .ok_or(AppError::Core(CoreError::NotFound {
                    entity: "Project",
                    id: project_id,
                }))?;
        }

        let request = ApprovalRequestRepo::create(self.pool, actor.user_id, &input).await?;

        tracing::info!(
            request_id = request.id,
            request_type = %request.request_type,
            user_id = actor.user_id,
            "Approval request created"
        );
        self.events.publish(
            PlatformEvent::new(REQUEST_CREATED)
                .with_source(ENTITY_APPROVAL_REQUEST, request.id)
                .with_actor(actor.user_id)
                .with_payload(json!({ "request_type": request.request_type })),
        );

        Ok(ApprovalRequestView::build(request, Utc::now()))
    }

    pub async fn get(&self, actor: &Actor, id: DbId) -> AppResult<ApprovalRequestView> {
        let request = ApprovalRequestRepo::find_by_id(self.pool, id)
            .await?
            .filter(|r| actor.owns(r.requester_id))
            .ok_or_else(|| request_not_found(id))?;
        Ok(ApprovalRequestView::build(request, Utc::now()))
    }

    /// Requests visible to `actor`: all for admins, otherwise their own.
    pub async fn list(
        &self,
        actor: &Actor,
        params: &ApprovalRequestListParams,
    ) -> AppResult<Vec<ApprovalRequestView>> {
        parse_optional::<RequestStatus>(params.status.as_deref())?;
        let requester_id = (!actor.is_admin).then_some(actor.user_id);

        let now = Utc::now();
        Ok(ApprovalRequestRepo::list(self.pool, requester_id, params)
            .await?
            .into_iter()
            .map(|r| ApprovalRequestView::build(r, now))
            .collect())
    }

    /// Edit a draft.
    pub async fn update(
        &self,
        actor: &Actor,
        id: DbId,
        input: &UpdateApprovalRequest,
    ) -> AppResult<ApprovalRequestView> {
        input.validate()?;
        if let Some(title) = &input.title {
            validate_title(title)?;
        }
        parse_optional::<RequestType>(input.request_type.as_deref())?;
        parse_optional::<RequestPriority>(input.priority.as_deref())?;

        let mut tx = self.pool.begin().await?;
        let request = self.lock_visible(&mut tx, actor, id).await?;
        Permission::RequesterOrAdmin.check(actor, &request)?;
        validate_can_edit(request_status(&request)?)?;

        let request = ApprovalRequestRepo::update_draft(&mut tx, id, input)
            .await?
            .ok_or_else(|| {
                CoreError::InvalidTransition(format!("Approval request {id} is no longer a draft"))
            })?;
        tx.commit().await?;

        tracing::info!(request_id = id, user_id = actor.user_id, "Approval request updated");
        Ok(ApprovalRequestView::build(request, Utc::now()))
    }

    /// draft -> submitted.
    pub async fn submit(&self, actor: &Actor, id: DbId) -> AppResult<ApprovalRequestView> {
        self.transition(actor, id, RequestStatus::Submitted, None, Permission::RequesterOrAdmin)
            .await
    }

    /// submitted -> under_review.
    pub async fn begin_review(&self, actor: &Actor, id: DbId) -> AppResult<ApprovalRequestView> {
        self.transition(actor, id, RequestStatus::UnderReview, None, Permission::AdminOnly)
            .await
    }

    /// under_review -> approved. Refused while an attached workflow is running.
    pub async fn approve(
        &self,
        actor: &Actor,
        id: DbId,
        notes: Option<&str>,
    ) -> AppResult<ApprovalRequestView> {
        self.transition(actor, id, RequestStatus::Approved, notes, Permission::AdminOnly)
            .await
    }

    /// under_review -> rejected. Refused while an attached workflow is running.
    pub async fn reject(
        &self,
        actor: &Actor,
        id: DbId,
        notes: Option<&str>,
    ) -> AppResult<ApprovalRequestView> {
        self.transition(actor, id, RequestStatus::Rejected, notes, Permission::AdminOnly)
            .await
    }

    /// Any non-terminal status -> cancelled.
    pub async fn cancel(
        &self,
        actor: &Actor,
        id: DbId,
        notes: Option<&str>,
    ) -> AppResult<ApprovalRequestView> {
        self.transition(
            actor,
            id,
            RequestStatus::Cancelled,
            notes,
            Permission::RequesterOrAdmin,
        )
        .await
    }

    /// Link a workflow instance to a request. If the instance already
    /// finished, the request takes the instance's outcome immediately.
    pub async fn attach_workflow(
        &self,
        actor: &Actor,
        id: DbId,
        instance_id: DbId,
    ) -> AppResult<ApprovalRequestView> {
        let mut tx = self.pool.begin().await?;

        // Instance before request, the same order the workflow engine uses.
        let instance = WorkflowInstanceRepo::lock(&mut tx, instance_id)
            .await?
            .filter(|i| actor.owns(i.started_by))
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "WorkflowInstance",
                id: instance_id,
            }))?;
        let request = self.lock_visible(&mut tx, actor, id).await?;
        Permission::RequesterOrAdmin.check(actor, &request)?;
        validate_can_attach(id, request_status(&request)?, request.workflow_instance_id)?;

        let mut request = ApprovalRequestRepo::attach_workflow(&mut tx, id, instance.id).await?;
        let mut events = vec![PlatformEvent::new(REQUEST_WORKFLOW_ATTACHED)
            .with_source(ENTITY_APPROVAL_REQUEST, id)
            .with_actor(actor.user_id)
            .with_payload(json!({ "workflow_instance_id": instance.id }))];

        if let Some((status, result)) = finished_state(&instance)? {
            let synced = sync_attached_requests(&mut tx, instance.id, status, result).await?;
            events.extend(synced_request_events(&synced, instance.id, actor.user_id));
            if let Some(updated) = synced.into_iter().find(|r| r.id == id) {
                request = updated;
            }
        }

        tx.commit().await?;

        tracing::info!(
            request_id = id,
            instance_id = instance.id,
            status = %request.status,
            user_id = actor.user_id,
            "Workflow attached to approval request"
        );
        for event in events {
            self.events.publish(event);
        }

        Ok(ApprovalRequestView::build(request, Utc::now()))
    }

    async fn transition(
        &self,
        actor: &Actor,
        id: DbId,
        next: RequestStatus,
        notes: Option<&str>,
        permission: Permission,
    ) -> AppResult<ApprovalRequestView> {
        let deciding = matches!(next, RequestStatus::Approved | RequestStatus::Rejected);
        let mut tx = self.pool.begin().await?;

        // Instance before request: look up the attachment unlocked, lock
        // the instance, then the request.
        let attached = match ApprovalRequestRepo::find_by_id(&mut *tx, id).await? {
            Some(ApprovalRequest {
                workflow_instance_id: Some(instance_id),
                ..
            }) if deciding => WorkflowInstanceRepo::lock(&mut tx, instance_id).await?,
            _ => None,
        };
        let request = self.lock_visible(&mut tx, actor, id).await?;
        permission.check(actor, &request)?;

        if deciding {
            if let Some(instance_id) = request.workflow_instance_id {
                // An attachment made after the lookup counts as running.
                let running = match &attached {
                    Some(instance) if instance.id == instance_id => {
                        finished_state(instance)?.is_none()
                    }
                    _ => true,
                };
                if running {
                    return Err(AppError::Core(CoreError::InvalidTransition(format!(
                        "Approval request {id} is decided by running workflow instance {instance_id}"
                    ))));
                }
            }
        }
        let current = request_status(&request)?;
        validate_transition(current, next)?;

        let request = ApprovalRequestRepo::set_status(&mut tx, id, next, notes).await?;
        tx.commit().await?;

        tracing::info!(
            request_id = id,
            from = %current,
            to = %next,
            user_id = actor.user_id,
            "Approval request status changed"
        );
        if let Some(event_type) = request_status_event(next) {
            self.events.publish(
                PlatformEvent::new(event_type)
                    .with_source(ENTITY_APPROVAL_REQUEST, id)
                    .with_actor(actor.user_id)
                    .with_payload(json!({ "from": current, "to": next })),
            );
        }

        Ok(ApprovalRequestView::build(request, Utc::now()))
    }

    /// Lock a request the actor can see. Others' requests are not found
    /// for members.
    async fn lock_visible(
        &self,
        conn: &mut sqlx::PgConnection,
        actor: &Actor,
        id: DbId,
    ) -> AppResult<ApprovalRequest> {
        ApprovalRequestRepo::lock(conn, id)
            .await?
            .filter(|r| actor.owns(r.requester_id))
            .ok_or_else(|| request_not_found(id))
    }
}
