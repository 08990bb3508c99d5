//! Workflow and approval orchestration.
//!
//! - [`registry::TemplateRegistry`] -- template and step definitions.
//! - [`workflow::WorkflowEngine`] -- starts and advances workflow instances.
//! - [`approvals::ApprovalRequestManager`] -- the approval request lifecycle.
//!
//! Every state transition runs in one PostgreSQL transaction that locks the
//! affected rows with `SELECT ... FOR UPDATE` before reading their state.
//! When both an instance and a request are locked, the instance is locked
//! first. Events are published on the bus only after commit.

pub mod approvals;
pub mod registry;
pub mod workflow;

use std::str::FromStr;

use taskflow_core::error::CoreError;
use taskflow_core::types::DbId;

use crate::middleware::auth::AuthUser;

/// The user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: DbId,
    pub is_admin: bool,
}

impl From<&AuthUser> for Actor {
    fn from(user: &AuthUser) -> Self {
        Self {
            user_id: user.user_id,
            is_admin: user.is_admin(),
        }
    }
}

impl Actor {
    /// Admins may act on anything; everyone else only on what they own.
    pub fn owns(&self, owner_id: DbId) -> bool {
        self.is_admin || self.user_id == owner_id
    }
}

/// Parse an enumeration value read back from the database.
///
/// The columns carry `CHECK` constraints, so a failure here means the
/// schema and the code disagree.
pub(crate) fn parse_stored<T>(column: &str, value: &str) -> Result<T, CoreError>
where
    T: FromStr<Err = CoreError>,
{
    value.parse().map_err(|_| {
        CoreError::Internal(format!("Unrecognised value '{value}' stored in {column}"))
    })
}

/// Parse an optional enumeration value supplied by a caller.
pub(crate) fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>, CoreError>
where
    T: FromStr<Err = CoreError>,
{
    value.map(str::parse).transpose()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use taskflow_core::workflow::InstanceStatus;

    use super::*;

    #[test]
    fn admins_own_everything() {
        let admin = Actor {
            user_id: 1,
            is_admin: true,
        };
        let member = Actor {
            user_id: 2,
            is_admin: false,
        };
        assert!(admin.owns(99));
        assert!(member.owns(2));
        assert!(!member.owns(99));
    }

    #[test]
    fn corrupt_stored_values_are_internal_errors() {
        assert_matches!(
            parse_stored::<InstanceStatus>("workflow_instances.status", "paused"),
            Err(CoreError::Internal(_))
        );
        assert_eq!(
            parse_stored::<InstanceStatus>("workflow_instances.status", "running").unwrap(),
            InstanceStatus::Running
        );
    }

    #[test]
    fn unknown_caller_values_are_validation_errors() {
        assert_matches!(
            parse_optional::<InstanceStatus>(Some("paused")),
            Err(CoreError::Validation(_))
        );
        assert_eq!(parse_optional::<InstanceStatus>(None).unwrap(), None);
    }
}
