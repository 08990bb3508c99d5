//! Workflow template, step, and instance rules.
//!
//! Defines the enumerations stored on workflow rows, template and step
//! validation used by the registry, and the transition planner that the
//! instance engine applies inside a database transaction. Nothing here
//! touches storage: callers load the rows, ask the planner what happens
//! next, then persist the plan.

use crate::error::CoreError;
use crate::roles;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

define_str_enum! {
    /// Classification of a workflow template.
    TemplateCategory("template category") {
        TaskApproval => "task_approval",
        ProjectApproval => "project_approval",
        ChangeRequest => "change_request",
        IssueManagement => "issue_management",
        ReleaseManagement => "release_management",
        Custom => "custom",
    }
}

define_str_enum! {
    /// What a step asks of its approvers.
    StepType("step type") {
        Approval => "approval",
        Review => "review",
        Notification => "notification",
        Action => "action",
        Condition => "condition",
    }
}

define_str_enum! {
    /// Strategy used to resolve who may act on a step.
    ApproverType("approver type") {
        SpecificUser => "specific_user",
        RoleBased => "role_based",
        ProjectOwner => "project_owner",
        TaskAssignee => "task_assignee",
        AnyMember => "any_member",
    }
}

define_str_enum! {
    /// Lifecycle status of a workflow instance.
    InstanceStatus("instance status") {
        Running => "running",
        Completed => "completed",
        Cancelled => "cancelled",
        Error => "error",
    }
}

define_str_enum! {
    /// Terminal result of a workflow instance.
    InstanceResult("instance result") {
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
        Error => "error",
    }
}

define_str_enum! {
    /// Lifecycle status of a step instance.
    StepInstanceStatus("step instance status") {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Skipped => "skipped",
        Error => "error",
        /// Closed because the enclosing instance was cancelled.
        Cancelled => "cancelled",
    }
}

define_str_enum! {
    /// Outcome recorded when a step instance is completed.
    StepOutcome("step outcome") {
        Approved => "approved",
        Rejected => "rejected",
        Skipped => "skipped",
        Error => "error",
    }
}

impl InstanceStatus {
    /// Completed, cancelled, and error instances never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl StepInstanceStatus {
    /// A step instance that can still be begun or completed.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

// ---------------------------------------------------------------------------
// Template and step validation
// ---------------------------------------------------------------------------

/// Maximum length of template, step, and instance names.
pub const MAX_NAME_LENGTH: usize = 200;

/// Timeout applied to a step when the definition omits one.
pub const DEFAULT_TIMEOUT_HOURS: i32 = 72;

/// Key in a step's `config` object naming the role for `role_based` steps.
pub const CONFIG_ROLE_KEY: &str = "role";

/// Validate a template or step name.
pub fn validate_name(kind: &str, name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{kind} name must not be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "{kind} name exceeds maximum length of {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate that every step order is 1-based and unique within a template.
pub fn validate_step_orders(orders: &[i32]) -> Result<(), CoreError> {
    let mut seen = std::collections::HashSet::with_capacity(orders.len());
    for &order in orders {
        if order < 1 {
            return Err(CoreError::Validation(format!(
                "Step order must be 1 or greater (got {order})"
            )));
        }
        if !seen.insert(order) {
            return Err(CoreError::Validation(format!(
                "Duplicate step order {order} within template"
            )));
        }
    }
    Ok(())
}

/// Read the role configured for a `role_based` step, if any.
pub fn configured_role(config: &serde_json::Value) -> Option<&str> {
    config.get(CONFIG_ROLE_KEY).and_then(|v| v.as_str())
}

/// Everything the registry checks about a single step definition.
#[derive(Debug, Clone, Copy)]
pub struct StepCheck<'a> {
    pub name: &'a str,
    pub order: i32,
    pub approver_type: ApproverType,
    pub config: &'a serde_json::Value,
    pub approver_count: usize,
    pub timeout_hours: i32,
}

/// Validate one step definition.
///
/// - `timeout_hours` must be non-negative (0 disables the timeout).
/// - `config` must be a JSON object.
/// - `role_based` steps must name a known role under `config.role`.
/// - `specific_user` steps must list at least one approver.
pub fn validate_step(step: &StepCheck<'_>) -> Result<(), CoreError> {
    validate_name("Step", step.name)?;

    if step.timeout_hours < 0 {
        return Err(CoreError::Validation(format!(
            "Step '{}' has a negative timeout ({} hours)",
            step.name, step.timeout_hours
        )));
    }

    if !step.config.is_object() {
        return Err(CoreError::Validation(format!(
            "Step '{}' config must be a JSON object",
            step.name
        )));
    }

    match step.approver_type {
        ApproverType::RoleBased => {
            let role = configured_role(step.config).ok_or_else(|| {
                CoreError::Validation(format!(
                    "Role-based step '{}' must set config.{CONFIG_ROLE_KEY}",
                    step.name
                ))
            })?;
            roles::validate_role(role)?;
        }
        ApproverType::SpecificUser if step.approver_count == 0 => {
            return Err(CoreError::Validation(format!(
                "Specific-user step '{}' must list at least one approver",
                step.name
            )));
        }
        _ => {}
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Step ordering
// ---------------------------------------------------------------------------

/// The identity and position of a step within its template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPosition {
    pub id: DbId,
    pub order: i32,
}

/// The step an instance starts on: the lowest order.
pub fn first_step(steps: &[StepPosition]) -> Option<StepPosition> {
    steps.iter().copied().min_by_key(|s| s.order)
}

/// The step that follows `current_order`, if any.
pub fn next_step(steps: &[StepPosition], current_order: i32) -> Option<StepPosition> {
    steps
        .iter()
        .copied()
        .filter(|s| s.order > current_order)
        .min_by_key(|s| s.order)
}

// ---------------------------------------------------------------------------
// Instance transitions
// ---------------------------------------------------------------------------

/// Check that a template may start a new instance.
///
/// Inactive templates are hidden from use; templates with no steps have no
/// defined completion policy and are rejected as a configuration error.
pub fn validate_can_start(
    template_id: DbId,
    is_active: bool,
    step_count: usize,
) -> Result<(), CoreError> {
    if !is_active {
        return Err(CoreError::Validation(format!(
            "Workflow template {template_id} is inactive"
        )));
    }
    if step_count == 0 {
        return Err(CoreError::Configuration(format!(
            "Workflow template {template_id} has no steps"
        )));
    }
    Ok(())
}

/// Check that an instance is still running before any step acts on it.
pub fn ensure_running(instance_id: DbId, status: InstanceStatus) -> Result<(), CoreError> {
    if status.is_terminal() {
        return Err(CoreError::InvalidTransition(format!(
            "Workflow instance {instance_id} is {status}, not running"
        )));
    }
    Ok(())
}

/// Check that `step_id` is the instance's current step.
pub fn ensure_current_step(
    instance_id: DbId,
    current_step_id: Option<DbId>,
    step_id: DbId,
) -> Result<(), CoreError> {
    if current_step_id != Some(step_id) {
        return Err(CoreError::InvalidTransition(format!(
            "Step {step_id} is not the current step of workflow instance {instance_id}"
        )));
    }
    Ok(())
}

/// Check that a pending step instance may move to `in_progress`.
pub fn validate_can_begin(
    instance_status: InstanceStatus,
    step_status: StepInstanceStatus,
    instance_id: DbId,
) -> Result<(), CoreError> {
    ensure_running(instance_id, instance_status)?;
    if step_status != StepInstanceStatus::Pending {
        return Err(CoreError::InvalidTransition(format!(
            "Cannot begin a step that is {step_status}"
        )));
    }
    Ok(())
}

/// Check that a running instance may be cancelled.
pub fn validate_can_cancel(instance_id: DbId, status: InstanceStatus) -> Result<(), CoreError> {
    if status != InstanceStatus::Running {
        return Err(CoreError::InvalidTransition(format!(
            "Cannot cancel workflow instance {instance_id}: it is {status}"
        )));
    }
    Ok(())
}

/// What happens to the enclosing instance after a step completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceAdvance {
    /// The instance stays running and moves to the given step.
    MoveTo { step_id: DbId },
    /// The instance reaches a terminal state.
    Finish {
        status: InstanceStatus,
        result: InstanceResult,
    },
}

impl InstanceAdvance {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }
}

/// The full effect of completing one step instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionPlan {
    /// Status the completed step instance moves to.
    pub step_status: StepInstanceStatus,
    /// Effect on the enclosing instance.
    pub advance: InstanceAdvance,
}

/// Inputs to [`plan_step_completion`].
#[derive(Debug, Clone, Copy)]
pub struct CompletionInput {
    pub instance_status: InstanceStatus,
    pub step_status: StepInstanceStatus,
    pub outcome: StepOutcome,
    pub step_required: bool,
    /// The step after the current one by order, if any.
    pub next_step: Option<StepPosition>,
}

/// Decide the effect of completing a step instance with `outcome`.
///
/// - The instance must be running and the step instance open.
/// - `rejected` on a required step finishes the instance as rejected.
/// - `approved`, `skipped`, and `rejected` on an optional step advance to
///   the next step, or finish as approved when none remains.
/// - `error` finishes the instance with status and result `error`.
pub fn plan_step_completion(
    instance_id: DbId,
    input: &CompletionInput,
) -> Result<CompletionPlan, CoreError> {
    ensure_running(instance_id, input.instance_status)?;

    if !input.step_status.is_open() {
        return Err(CoreError::InvalidTransition(format!(
            "Cannot complete a step that is already {}",
            input.step_status
        )));
    }

    let step_status = match input.outcome {
        StepOutcome::Approved | StepOutcome::Rejected => StepInstanceStatus::Completed,
        StepOutcome::Skipped => StepInstanceStatus::Skipped,
        StepOutcome::Error => StepInstanceStatus::Error,
    };

    let advance_or_finish = || match input.next_step {
        Some(next) => InstanceAdvance::MoveTo { step_id: next.id },
        None => InstanceAdvance::Finish {
            status: InstanceStatus::Completed,
            result: InstanceResult::Approved,
        },
    };

    let advance = match input.outcome {
        StepOutcome::Rejected if input.step_required => InstanceAdvance::Finish {
            status: InstanceStatus::Completed,
            result: InstanceResult::Rejected,
        },
        StepOutcome::Error => InstanceAdvance::Finish {
            status: InstanceStatus::Error,
            result: InstanceResult::Error,
        },
        StepOutcome::Approved | StepOutcome::Skipped | StepOutcome::Rejected => {
            advance_or_finish()
        }
    };

    Ok(CompletionPlan {
        step_status,
        advance,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
