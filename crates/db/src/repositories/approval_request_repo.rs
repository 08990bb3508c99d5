//! Repository for the `approval_requests` table.

use sqlx::{PgConnection, PgExecutor, PgPool};
use taskflow_core::approval_request::{RequestPriority, RequestStatus, TERMINAL_STATUSES};
use taskflow_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use taskflow_core::types::DbId;

use crate::models::approval_request::{
    ApprovalRequest, ApprovalRequestListParams, CreateApprovalRequest, UpdateApprovalRequest,
};

const COLUMNS: &str = "id, title, description, request_type, priority, requester_id, \
    project_id, task_id, workflow_instance_id, status, submitted_at, deadline, completed_at, \
    attachments, notes, created_at, updated_at";

fn terminal_statuses() -> Vec<&'static str> {
    TERMINAL_STATUSES.iter().map(|s| s.as_str()).collect()
}

/// Provides persistence for approval requests.
pub struct ApprovalRequestRepo;

impl ApprovalRequestRepo {
    /// Insert a new draft owned by `requester_id`.
    pub async fn create(
        pool: &PgPool,
        requester_id: DbId,
        input: &CreateApprovalRequest,
    ) -> Result<ApprovalRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO approval_requests
                (title, description, request_type, priority, requester_id,
                 project_id, task_id, status, deadline, attachments, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(input.title.trim())
            .bind(&input.description)
            .bind(&input.request_type)
            .bind(
                input
                    .priority
                    .as_deref()
                    .unwrap_or(RequestPriority::Normal.as_str()),
            )
            .bind(requester_id)
            .bind(input.project_id)
            .bind(input.task_id)
            .bind(RequestStatus::Draft.as_str())
            .bind(input.deadline)
            .bind(serde_json::Value::Array(input.attachments.clone()))
            .bind(&input.notes)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<ApprovalRequest>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM approval_requests WHERE id = $1");
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Load a request and hold a row lock until the transaction ends.
    pub async fn lock(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<ApprovalRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM approval_requests WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Apply edits to a request that is still a draft.
    ///
    /// The status guard is repeated in SQL; `None` means the row is gone or
    /// no longer a draft.
    pub async fn update_draft(
        conn: &mut PgConnection,
        id: DbId,
        input: &UpdateApprovalRequest,
    ) -> Result<Option<ApprovalRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE approval_requests SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                request_type = COALESCE($4, request_type),
                priority = COALESCE($5, priority),
                deadline = COALESCE($6, deadline),
                attachments = COALESCE($7, attachments),
                notes = COALESCE($8, notes),
                updated_at = NOW()
             WHERE id = $1 AND status = $9
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(id)
            .bind(input.title.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(&input.request_type)
            .bind(&input.priority)
            .bind(input.deadline)
            .bind(input.attachments.clone().map(serde_json::Value::Array))
            .bind(&input.notes)
            .bind(RequestStatus::Draft.as_str())
            .fetch_optional(conn)
            .await
    }

    /// Write a new status, stamping `submitted_at` on submission and
    /// `completed_at` on terminal statuses. `notes`, when given, replaces
    /// the stored notes.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: DbId,
        status: RequestStatus,
        notes: Option<&str>,
    ) -> Result<ApprovalRequest, sqlx::Error> {
        let query = format!(
            "UPDATE approval_requests SET
                status = $2,
                submitted_at = CASE WHEN $3 THEN NOW() ELSE submitted_at END,
                completed_at = CASE WHEN $4 THEN NOW() ELSE completed_at END,
                notes = COALESCE($5, notes),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(id)
            .bind(status.as_str())
            .bind(status == RequestStatus::Submitted)
            .bind(status.is_terminal())
            .bind(notes)
            .fetch_one(conn)
            .await
    }

    /// Link a request to a workflow instance.
    pub async fn attach_workflow(
        conn: &mut PgConnection,
        id: DbId,
        instance_id: DbId,
    ) -> Result<ApprovalRequest, sqlx::Error> {
        let query = format!(
            "UPDATE approval_requests SET workflow_instance_id = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(id)
            .bind(instance_id)
            .fetch_one(conn)
            .await
    }

    /// Move every non-terminal request attached to `instance_id` to `status`.
    ///
    /// Returns the updated requests.
    pub async fn sync_with_instance(
        conn: &mut PgConnection,
        instance_id: DbId,
        status: RequestStatus,
    ) -> Result<Vec<ApprovalRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE approval_requests SET
                status = $2,
                completed_at = CASE WHEN $3 THEN NOW() ELSE completed_at END,
                updated_at = NOW()
             WHERE workflow_instance_id = $1
               AND status <> ALL($4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(instance_id)
            .bind(status.as_str())
            .bind(status.is_terminal())
            .bind(terminal_statuses())
            .fetch_all(conn)
            .await
    }

    /// List requests, newest first.
    ///
    /// `requester_id` restricts the list to one requester (member view) and
    /// takes precedence over the `requester_id` query parameter. With
    /// `params.overdue`, only open requests past their deadline are kept.
    pub async fn list(
        pool: &PgPool,
        requester_id: Option<DbId>,
        params: &ApprovalRequestListParams,
    ) -> Result<Vec<ApprovalRequest>, sqlx::Error> {
        let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
        let offset = clamp_offset(params.offset);
        let query = format!(
            "SELECT {COLUMNS} FROM approval_requests
             WHERE ($1::BIGINT IS NULL OR requester_id = $1)
               AND ($2::TEXT IS NULL OR status = $2)
               AND ($3::BIGINT IS NULL OR project_id = $3)
               AND (NOT $4 OR (deadline IS NOT NULL AND deadline < NOW()
                               AND status <> ALL($5)))
             ORDER BY created_at DESC, id DESC
             LIMIT $6 OFFSET $7"
        );
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(requester_id.or(params.requester_id))
            .bind(&params.status)
            .bind(params.project_id)
            .bind(params.overdue)
            .bind(terminal_statuses())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
