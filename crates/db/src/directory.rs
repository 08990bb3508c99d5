//! PostgreSQL-backed [`ApproverDirectory`].

use async_trait::async_trait;
use sqlx::PgPool;
use taskflow_core::approvers::ApproverDirectory;
use taskflow_core::types::DbId;

use crate::repositories::{ProjectRepo, UserRepo};

/// Answers approver-resolution lookups from the users, projects, and tasks
/// tables.
#[derive(Debug, Clone, Copy)]
pub struct PgApproverDirectory<'a> {
    pool: &'a PgPool,
}

impl<'a> PgApproverDirectory<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApproverDirectory for PgApproverDirectory<'_> {
    type Error = sqlx::Error;

    async fn users_with_role(&self, role: &str) -> Result<Vec<DbId>, sqlx::Error> {
        UserRepo::active_ids_with_role(self.pool, role).await
    }

    async fn project_owner(&self, project_id: DbId) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT owner_id FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(self.pool)
            .await
    }

    async fn project_members(&self, project_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        ProjectRepo::member_ids(self.pool, project_id).await
    }

    async fn task_assignee(&self, task_id: DbId) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT assignee_id FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(self.pool)
            .await
    }
}
