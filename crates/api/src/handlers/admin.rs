//! User administration. Admin role only.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use taskflow_core::error::CoreError;
use taskflow_core::roles::validate_role;
use taskflow_db::models::user::{CreateUser, CreateUserRequest, User};
use taskflow_db::repositories::UserRepo;

use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Check a creation request and hash its password.
fn prepare(input: CreateUserRequest) -> AppResult<CreateUser> {
    let username = input.username.trim();
    let email = input.email.trim();
    if username.is_empty() || email.is_empty() {
        return Err(CoreError::Validation("username and email are required".into()).into());
    }
    if let Some(role) = input.role.as_deref() {
        validate_role(role)?;
    }
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH).map_err(CoreError::Validation)?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Cannot hash password: {e}")))?;

    Ok(CreateUser {
        username: username.to_owned(),
        email: email.to_owned(),
        password_hash,
        role: input.role,
    })
}

/// `POST /admin/users`: a new account plus profile, `member` unless told otherwise.
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<User>>)> {
    let user = UserRepo::create(&state.pool, &prepare(input)?).await?;

    tracing::info!(user_id = user.id, role = %user.role, admin_id = admin.user_id, "Account created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: user })))
}

pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<User>>>> {
    let data = UserRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn request(password: &str, role: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            username: "  erin ".into(),
            email: "erin@example.com".into(),
            password: password.into(),
            role: role.map(String::from),
        }
    }

    #[test]
    fn prepare_trims_and_hashes() {
        let user = prepare(request("long-enough-passphrase", None)).unwrap();
        assert_eq!(user.username, "erin");
        assert!(user.password_hash.starts_with("$argon2"));
        assert_eq!(user.role, None);
    }

    #[test]
    fn prepare_rejects_short_password_and_unknown_role() {
        assert_matches!(
            prepare(request("short", None)),
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            prepare(request("long-enough-passphrase", Some("owner"))),
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }
}
