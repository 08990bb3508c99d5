//! Approval request status lifecycle and derived fields.
//!
//! Transition rules:
//! - `draft`        -> `submitted`, `cancelled`
//! - `submitted`    -> `under_review`, `cancelled`
//! - `under_review` -> `approved`, `rejected`, `cancelled`
//! - `approved`, `rejected`, `cancelled` are terminal
//!
//! A request may be backed by a workflow instance. When the instance
//! finishes, [`status_for_instance`] tells the engine which status the
//! request must take so the two records never disagree.

use crate::error::CoreError;
use crate::overdue;
use crate::types::{DbId, Timestamp};
use crate::workflow::{InstanceResult, InstanceStatus};

define_str_enum! {
    /// What the requester is asking approval for.
    RequestType("request type") {
        TaskCreation => "task_creation",
        TaskModification => "task_modification",
        ProjectChange => "project_change",
        BudgetAdjustment => "budget_adjustment",
        ResourceAllocation => "resource_allocation",
        Custom => "custom",
    }
}

define_str_enum! {
    /// Urgency of an approval request.
    RequestPriority("request priority") {
        Low => "low",
        Normal => "normal",
        High => "high",
        Urgent => "urgent",
    }
}

define_str_enum! {
    /// Lifecycle status of an approval request.
    RequestStatus("request status") {
        Draft => "draft",
        Submitted => "submitted",
        UnderReview => "under_review",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

/// Statuses after which a request never changes again.
pub const TERMINAL_STATUSES: &[RequestStatus] = &[
    RequestStatus::Approved,
    RequestStatus::Rejected,
    RequestStatus::Cancelled,
];

/// Maximum length for the request title (characters).
pub const MAX_TITLE_LENGTH: usize = 200;

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        TERMINAL_STATUSES.contains(&self)
    }

    /// Returns the set of statuses this status may transition to.
    pub fn valid_transitions(self) -> &'static [RequestStatus] {
        match self {
            Self::Draft => &[Self::Submitted, Self::Cancelled],
            Self::Submitted => &[Self::UnderReview, Self::Cancelled],
            Self::UnderReview => &[Self::Approved, Self::Rejected, Self::Cancelled],
            Self::Approved | Self::Rejected | Self::Cancelled => &[],
        }
    }
}

/// Validate that a request may move from `current` to `next`.
pub fn validate_transition(current: RequestStatus, next: RequestStatus) -> Result<(), CoreError> {
    if current.valid_transitions().contains(&next) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition(format!(
            "Cannot transition approval request from '{current}' to '{next}'"
        )))
    }
}

/// Validate a request title.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Title must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Title exceeds maximum length of {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Only drafts may be edited.
pub fn validate_can_edit(status: RequestStatus) -> Result<(), CoreError> {
    if status != RequestStatus::Draft {
        return Err(CoreError::InvalidTransition(format!(
            "Only draft requests can be edited (request is '{status}')"
        )));
    }
    Ok(())
}

/// A workflow may be attached once, and only to a non-terminal request.
pub fn validate_can_attach(
    request_id: DbId,
    status: RequestStatus,
    attached_instance_id: Option<DbId>,
) -> Result<(), CoreError> {
    if status.is_terminal() {
        return Err(CoreError::InvalidTransition(format!(
            "Cannot attach a workflow to approval request {request_id}: it is '{status}'"
        )));
    }
    if let Some(existing) = attached_instance_id {
        return Err(CoreError::Conflict(format!(
            "Approval request {request_id} is already attached to workflow instance {existing}"
        )));
    }
    Ok(())
}

/// The status a backing workflow instance imposes on its request.
///
/// `None` while the instance is running, and for instances that ended in
/// error: those are left for a human to resolve.
pub fn status_for_instance(
    status: InstanceStatus,
    result: Option<InstanceResult>,
) -> Option<RequestStatus> {
    match (status, result) {
        (InstanceStatus::Completed, Some(InstanceResult::Approved)) => {
            Some(RequestStatus::Approved)
        }
        (InstanceStatus::Completed, Some(InstanceResult::Rejected)) => {
            Some(RequestStatus::Rejected)
        }
        (InstanceStatus::Cancelled, _) => Some(RequestStatus::Cancelled),
        _ => None,
    }
}

/// Whether the request is past its deadline while still open.
pub fn is_overdue(deadline: Option<Timestamp>, status: RequestStatus, now: Timestamp) -> bool {
    overdue::deadline_passed(deadline, status.is_terminal(), now)
}

/// Signed whole days until the deadline; absent once terminal.
pub fn days_remaining(
    deadline: Option<Timestamp>,
    status: RequestStatus,
    now: Timestamp,
) -> Option<i64> {
    overdue::days_remaining(deadline, status.is_terminal(), now)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn happy_path_transitions() {
        assert!(validate_transition(RequestStatus::Draft, RequestStatus::Submitted).is_ok());
        assert!(validate_transition(RequestStatus::Submitted, RequestStatus::UnderReview).is_ok());
        assert!(validate_transition(RequestStatus::UnderReview, RequestStatus::Approved).is_ok());
        assert!(validate_transition(RequestStatus::UnderReview, RequestStatus::Rejected).is_ok());
    }

    #[test]
    fn cannot_skip_review() {
        assert_matches!(
            validate_transition(RequestStatus::Draft, RequestStatus::Approved),
            Err(CoreError::InvalidTransition(_))
        );
        assert!(validate_transition(RequestStatus::Submitted, RequestStatus::Rejected).is_err());
    }

    #[test]
    fn submit_requires_draft() {
        assert!(validate_transition(RequestStatus::Submitted, RequestStatus::Submitted).is_err());
        assert!(validate_transition(RequestStatus::Approved, RequestStatus::Submitted).is_err());
    }

    #[test]
    fn cancel_from_any_non_terminal() {
        for status in RequestStatus::ALL {
            let result = validate_transition(*status, RequestStatus::Cancelled);
            assert_eq!(result.is_ok(), !status.is_terminal(), "from {status}");
        }
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for status in TERMINAL_STATUSES {
            assert!(status.valid_transitions().is_empty());
        }
    }

    #[test]
    fn overdue_submitted_request_past_deadline() {
        let now = Utc::now();
        let deadline = Some(now - Duration::days(1));
        assert!(is_overdue(deadline, RequestStatus::Submitted, now));
        assert!(!is_overdue(deadline, RequestStatus::Approved, now));
        assert!(!is_overdue(None, RequestStatus::Submitted, now));
    }

    #[test]
    fn days_remaining_absent_once_terminal() {
        let now = Utc::now();
        let deadline = Some(now + Duration::days(2) + Duration::hours(1));
        assert_eq!(days_remaining(deadline, RequestStatus::Draft, now), Some(2));
        assert_eq!(days_remaining(deadline, RequestStatus::Rejected, now), None);
    }

    #[test]
    fn instance_outcomes_map_to_request_status() {
        assert_eq!(
            status_for_instance(InstanceStatus::Completed, Some(InstanceResult::Approved)),
            Some(RequestStatus::Approved)
        );
        assert_eq!(
            status_for_instance(InstanceStatus::Completed, Some(InstanceResult::Rejected)),
            Some(RequestStatus::Rejected)
        );
        assert_eq!(
            status_for_instance(InstanceStatus::Cancelled, Some(InstanceResult::Cancelled)),
            Some(RequestStatus::Cancelled)
        );
        assert_eq!(
            status_for_instance(InstanceStatus::Error, Some(InstanceResult::Error)),
            None
        );
        assert_eq!(status_for_instance(InstanceStatus::Running, None), None);
    }

    #[test]
    fn attach_rules() {
        assert!(validate_can_attach(1, RequestStatus::Submitted, None).is_ok());
        assert_matches!(
            validate_can_attach(1, RequestStatus::Submitted, Some(3)),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(
            validate_can_attach(1, RequestStatus::Cancelled, None),
            Err(CoreError::InvalidTransition(_))
        );
    }

    #[test]
    fn only_drafts_are_editable() {
        assert!(validate_can_edit(RequestStatus::Draft).is_ok());
        assert!(validate_can_edit(RequestStatus::UnderReview).is_err());
    }

    #[test]
    fn title_rules() {
        assert!(validate_title("Budget increase for Q3").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title(&"t".repeat(MAX_TITLE_LENGTH + 1)).is_err());
    }
}
