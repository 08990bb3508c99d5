//! `POST /auth/login`.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use taskflow_core::error::CoreError;
use taskflow_db::models::user::User;
use taskflow_db::repositories::UserRepo;
use taskflow_db::DbPool;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::verify_password;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned bare, not wrapped in `data`.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    /// Seconds until `access_token` expires.
    pub expires_in: i64,
    pub user: User,
}

/// Exchange a username and password for an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = authenticate(&state.pool, &credentials).await?;
    UserRepo::record_successful_login(&state.pool, user.id).await?;

    let jwt = &state.config.jwt;
    let access_token = generate_access_token(user.id, &user.role, jwt)
        .map_err(|e| AppError::InternalError(format!("Cannot sign access token: {e}")))?;

    tracing::info!(user_id = user.id, role = %user.role, "Login succeeded");
    Ok(Json(LoginResponse {
        access_token,
        expires_in: jwt.access_token_expiry_secs(),
        user,
    }))
}

/// Unknown user and wrong password produce the same 401. A disabled
/// account with the right password gets 403.
async fn authenticate(pool: &DbPool, credentials: &LoginRequest) -> AppResult<User> {
    let rejected = || CoreError::Unauthorized("Invalid username or password".into());

    let Some(user) = UserRepo::find_by_username(pool, &credentials.username).await? else {
        return Err(rejected().into());
    };

    let matches = verify_password(&credentials.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Stored password hash unreadable: {e}")))?;
    if !matches {
        tracing::info!(user_id = user.id, "Login rejected: wrong password");
        return Err(rejected().into());
    }

    if !user.is_active {
        return Err(CoreError::Forbidden("Account is deactivated".into()).into());
    }
    Ok(user)
}
