//! Event type and source entity names.
//!
//! Event types are dot-separated `<entity>.<action>` strings.

use taskflow_core::approval_request::RequestStatus;
use taskflow_core::workflow::InstanceStatus;

/// Source entity type for workflow instance events.
pub const ENTITY_WORKFLOW_INSTANCE: &str = "workflow_instance";

/// Source entity type for approval request events.
pub const ENTITY_APPROVAL_REQUEST: &str = "approval_request";

/// Source entity type for workflow template events.
pub const ENTITY_WORKFLOW_TEMPLATE: &str = "workflow_template";

pub const WORKFLOW_STARTED: &str = "workflow.started";
pub const WORKFLOW_STEP_STARTED: &str = "workflow.step_started";
pub const WORKFLOW_STEP_COMPLETED: &str = "workflow.step_completed";
/// Instance finished with result `approved` or `rejected`.
pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
pub const WORKFLOW_CANCELLED: &str = "workflow.cancelled";
/// Instance finished with status `error`.
pub const WORKFLOW_FAILED: &str = "workflow.failed";

pub const TEMPLATE_CREATED: &str = "workflow_template.created";
pub const TEMPLATE_DEACTIVATED: &str = "workflow_template.deactivated";

pub const REQUEST_CREATED: &str = "approval_request.created";
pub const REQUEST_SUBMITTED: &str = "approval_request.submitted";
pub const REQUEST_UNDER_REVIEW: &str = "approval_request.under_review";
pub const REQUEST_APPROVED: &str = "approval_request.approved";
pub const REQUEST_REJECTED: &str = "approval_request.rejected";
pub const REQUEST_CANCELLED: &str = "approval_request.cancelled";
pub const REQUEST_WORKFLOW_ATTACHED: &str = "approval_request.workflow_attached";

/// Event type for an approval request entering `status`, if the status is
/// one that is announced.
pub fn request_status_event(status: RequestStatus) -> Option<&'static str> {
    match status {
        RequestStatus::Draft => None,
        RequestStatus::Submitted => Some(REQUEST_SUBMITTED),
        RequestStatus::UnderReview => Some(REQUEST_UNDER_REVIEW),
        RequestStatus::Approved => Some(REQUEST_APPROVED),
        RequestStatus::Rejected => Some(REQUEST_REJECTED),
        RequestStatus::Cancelled => Some(REQUEST_CANCELLED),
    }
}

/// Event type for an instance reaching a terminal status.
pub fn instance_finished_event(status: InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::Cancelled => WORKFLOW_CANCELLED,
        InstanceStatus::Error => WORKFLOW_FAILED,
        InstanceStatus::Running | InstanceStatus::Completed => WORKFLOW_COMPLETED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drafts_are_not_announced() {
        assert_eq!(request_status_event(RequestStatus::Draft), None);
        assert_eq!(
            request_status_event(RequestStatus::Rejected),
            Some(REQUEST_REJECTED)
        );
    }

    #[test]
    fn terminal_instance_events() {
        assert_eq!(instance_finished_event(InstanceStatus::Completed), WORKFLOW_COMPLETED);
        assert_eq!(instance_finished_event(InstanceStatus::Cancelled), WORKFLOW_CANCELLED);
        assert_eq!(instance_finished_event(InstanceStatus::Error), WORKFLOW_FAILED);
    }
}
