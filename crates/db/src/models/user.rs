//! Accounts and their profile role.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taskflow_core::types::{DbId, Timestamp};

/// `users` joined with `user_profiles`. Serializes without the hash.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// `admin` or `member`, from the profile.
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == taskflow_core::roles::ROLE_ADMIN
    }
}

/// Insert data for a user and its profile. `role: None` takes the default.
#[derive(Debug)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Option<String>,
}

/// `POST /admin/users` body. The password arrives in plain text.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_user_has_no_password_hash() {
        let now = chrono::Utc::now();
        let user = User {
            id: 3,
            username: "dana".into(),
            email: "dana@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: "admin".into(),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
        assert!(user.is_admin());
    }
}
