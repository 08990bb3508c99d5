//! Repository for the `tasks` table.

use sqlx::PgPool;
use taskflow_core::types::DbId;

use crate::models::task::{CreateTask, Task};

const COLUMNS: &str = "id, project_id, title, description, assignee_id, creator_id, \
                        status, due_date, created_at, updated_at";

/// Provides CRUD operations for tasks.
pub struct TaskRepo;

impl TaskRepo {
    pub async fn create(
        pool: &PgPool,
        creator_id: DbId,
        input: &CreateTask,
    ) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (project_id, title, description, assignee_id, creator_id, due_date)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(input.project_id)
            .bind(&input.title)
            .bind(input.description.as_deref().unwrap_or(""))
            .bind(input.assignee_id)
            .bind(creator_id)
            .bind(input.due_date)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
