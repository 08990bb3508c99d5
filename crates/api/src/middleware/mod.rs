//! Request extractors for authentication and roles.

pub mod auth;
pub mod rbac;
