//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches, where
//!   the entity supports updates

pub mod approval_request;
pub mod project;
pub mod task;
pub mod user;
pub mod workflow_instance;
pub mod workflow_step;
pub mod workflow_step_instance;
pub mod workflow_template;
