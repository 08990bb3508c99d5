//! Approval request models, DTOs, and read views.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taskflow_core::approval_request::{self, RequestStatus};
use taskflow_core::types::{DbId, Timestamp};
use validator::Validate;

/// A row from the `approval_requests` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ApprovalRequest {
    pub id: DbId,
    pub title: String,
    pub description: String,
    pub request_type: String,
    pub priority: String,
    pub requester_id: DbId,
    pub project_id: Option<DbId>,
    pub task_id: Option<DbId>,
    pub workflow_instance_id: Option<DbId>,
    pub status: String,
    pub submitted_at: Option<Timestamp>,
    pub deadline: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Ordered list of opaque attachment metadata (JSON array).
    pub attachments: serde_json::Value,
    pub notes: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a draft approval request. The requester is the caller.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateApprovalRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub request_type: String,
    pub priority: Option<String>,
    pub project_id: Option<DbId>,
    pub task_id: Option<DbId>,
    pub deadline: Option<Timestamp>,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
    #[serde(default)]
    pub notes: String,
}

/// DTO for editing a draft. All fields are optional.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateApprovalRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub request_type: Option<String>,
    pub priority: Option<String>,
    pub deadline: Option<Timestamp>,
    pub attachments: Option<Vec<serde_json::Value>>,
    pub notes: Option<String>,
}

/// Request body for `POST /approval-requests/{id}/workflow`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachWorkflow {
    pub instance_id: DbId,
}

/// Optional body for approve/reject/cancel actions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionNote {
    pub notes: Option<String>,
}

/// Query parameters for `GET /approval-requests`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequestListParams {
    pub status: Option<String>,
    pub requester_id: Option<DbId>,
    pub project_id: Option<DbId>,
    /// Keep only requests past their deadline while still open.
    #[serde(default)]
    pub overdue: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A request with its derived deadline fields.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequestView {
    #[serde(flatten)]
    pub request: ApprovalRequest,
    pub is_overdue: bool,
    pub days_remaining: Option<i64>,
}

impl ApprovalRequestView {
    /// Derive deadline fields at `now`. An unknown stored status yields no
    /// deadline signal.
    pub fn build(request: ApprovalRequest, now: Timestamp) -> Self {
        let (is_overdue, days_remaining) = match request.status.parse::<RequestStatus>() {
            Ok(status) => (
                approval_request::is_overdue(request.deadline, status, now),
                approval_request::days_remaining(request.deadline, status, now),
            ),
            Err(_) => (false, None),
        };
        Self {
            request,
            is_overdue,
            days_remaining,
        }
    }
}
