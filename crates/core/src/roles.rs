//! Well-known profile role constants.
//!
//! These must match the `CHECK` constraint on `user_profiles.role` in
//! `20261001000001_create_users.sql`.

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";

/// All valid profile roles.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_MEMBER];

/// Role assigned by the profile factory when none is requested.
pub const DEFAULT_ROLE: &str = ROLE_MEMBER;

/// Validate that a role string is one of the known roles.
pub fn validate_role(role: &str) -> Result<(), CoreError> {
    if VALID_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid role '{role}'. Must be one of: {}",
            VALID_ROLES.join(", ")
        )))
    }
}
