//! `users` plus the one-to-one `user_profiles` row holding the role.

use sqlx::{PgExecutor, PgPool};
use taskflow_core::roles::DEFAULT_ROLE;
use taskflow_core::types::DbId;

use crate::models::user::{CreateUser, User};

/// `SELECT` over a user and its profile, to be followed by a filter.
const SELECT_USER: &str = "SELECT u.id, u.username, u.email, u.password_hash, u.is_active, \
                                  u.last_login_at, u.created_at, u.updated_at, p.role \
                           FROM users u JOIN user_profiles p ON p.user_id = u.id";

pub struct UserRepo;

impl UserRepo {
    /// The user and its profile are written together or not at all.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let id: DbId = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        let role = input.role.as_deref().unwrap_or(DEFAULT_ROLE);
        sqlx::query("INSERT INTO user_profiles (user_id, role) VALUES ($1, $2)")
            .bind(id)
            .bind(role)
            .execute(&mut *tx)
            .await?;

        let user = Self::fetch_by_id(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn fetch_by_id<'e>(db: impl PgExecutor<'e>, id: DbId) -> Result<User, sqlx::Error> {
        sqlx::query_as(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(id)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Exact, case-sensitive match.
    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("{SELECT_USER} WHERE u.username = $1"))
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as(&format!("{SELECT_USER} ORDER BY u.created_at DESC, u.id DESC"))
            .fetch_all(pool)
            .await
    }

    /// Active holders of `role`, lowest id first. Backs role-based approver resolution.
    pub async fn active_ids_with_role(pool: &PgPool, role: &str) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(&format!(
            "SELECT id FROM ({SELECT_USER} WHERE p.role = $1 AND u.is_active) holders ORDER BY id"
        ))
        .bind(role)
        .fetch_all(pool)
        .await
    }

    pub async fn record_successful_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|_| ())
    }
}
