//! Approver resolution for workflow steps.
//!
//! Each step names a strategy ([`ApproverType`]). Resolving it needs facts
//! owned by other parts of the system (who holds a role, who owns a
//! project, who a task is assigned to), so those lookups go through the
//! [`ApproverDirectory`] trait. The database layer implements it against
//! PostgreSQL; tests use an in-memory directory.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::DbId;
use crate::workflow::{configured_role, ApproverType, CONFIG_ROLE_KEY};

/// Read-only user directory consulted during approver resolution.
#[async_trait]
pub trait ApproverDirectory: Send + Sync {
    type Error: std::fmt::Debug + std::fmt::Display + Send;

    /// Active users whose profile role is `role`.
    async fn users_with_role(&self, role: &str) -> Result<Vec<DbId>, Self::Error>;

    /// Owner of a project, or `None` if the project does not exist.
    async fn project_owner(&self, project_id: DbId) -> Result<Option<DbId>, Self::Error>;

    /// Members of a project.
    async fn project_members(&self, project_id: DbId) -> Result<Vec<DbId>, Self::Error>;

    /// Assignee of a task, or `None` if the task does not exist.
    async fn task_assignee(&self, task_id: DbId) -> Result<Option<DbId>, Self::Error>;
}

/// Failure while resolving approvers: either a domain error or a failed
/// directory lookup.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError<E> {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Directory lookup failed: {0}")]
    Directory(E),
}

/// The parts of a step definition that resolution reads.
#[derive(Debug, Clone, Copy)]
pub struct ApproverStep<'a> {
    pub step_id: DbId,
    pub approver_type: ApproverType,
    pub config: &'a serde_json::Value,
    /// Explicit approvers for `specific_user` steps.
    pub approver_ids: &'a [DbId],
}

/// The project and task an instance runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionTarget {
    pub project_id: Option<DbId>,
    pub task_id: Option<DbId>,
}

/// Resolve the set of users allowed to act on `step`.
///
/// Returns a sorted, de-duplicated list. Fails with
/// [`CoreError::Resolution`] when the strategy needs a target the instance
/// does not have, when the target no longer exists, or when nobody
/// resolves.
pub async fn resolve_approvers<D>(
    directory: &D,
    step: &ApproverStep<'_>,
    target: ResolutionTarget,
) -> Result<Vec<DbId>, ResolveError<D::Error>>
where
    D: ApproverDirectory + ?Sized,
{
    let approvers: BTreeSet<DbId> = match step.approver_type {
        ApproverType::SpecificUser => step.approver_ids.iter().copied().collect(),

        ApproverType::RoleBased => {
            let role = configured_role(step.config).ok_or_else(|| {
                CoreError::Resolution(format!(
                    "Step {} is role-based but config.{CONFIG_ROLE_KEY} is not set",
                    step.step_id
                ))
            })?;
            directory
                .users_with_role(role)
                .await
                .map_err(ResolveError::Directory)?
                .into_iter()
                .collect()
        }

        ApproverType::ProjectOwner => {
            let project_id = require_project(step, target)?;
            let owner = directory
                .project_owner(project_id)
                .await
                .map_err(ResolveError::Directory)?
                .ok_or_else(|| {
                    CoreError::Resolution(format!("Project {project_id} no longer exists"))
                })?;
            BTreeSet::from([owner])
        }

        ApproverType::TaskAssignee => {
            let task_id = target.task_id.ok_or_else(|| {
                CoreError::Resolution(format!(
                    "Step {} resolves to the task assignee but the workflow has no task",
                    step.step_id
                ))
            })?;
            let assignee = directory
                .task_assignee(task_id)
                .await
                .map_err(ResolveError::Directory)?
                .ok_or_else(|| CoreError::Resolution(format!("Task {task_id} no longer exists")))?;
            BTreeSet::from([assignee])
        }

        ApproverType::AnyMember => {
            let project_id = require_project(step, target)?;
            directory
                .project_members(project_id)
                .await
                .map_err(ResolveError::Directory)?
                .into_iter()
                .collect()
        }
    };

    if approvers.is_empty() {
        return Err(CoreError::Resolution(format!(
            "No approvers resolved for step {} ({})",
            step.step_id, step.approver_type
        ))
        .into());
    }

    Ok(approvers.into_iter().collect())
}

fn require_project(step: &ApproverStep<'_>, target: ResolutionTarget) -> Result<DbId, CoreError> {
    target.project_id.ok_or_else(|| {
        CoreError::Resolution(format!(
            "Step {} resolves through the project ({}) but the workflow has no project",
            step.step_id, step.approver_type
        ))
    })
}
