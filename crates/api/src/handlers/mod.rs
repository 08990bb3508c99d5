//! HTTP handlers, one module per resource.
//!
//! Handlers extract the caller, delegate to [`crate::engine`] or the
//! repositories, and wrap results in [`crate::response::DataResponse`].

pub mod admin;
pub mod approval_requests;
pub mod auth;
pub mod projects;
pub mod tasks;
pub mod workflow_instances;
pub mod workflow_templates;
