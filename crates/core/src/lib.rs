//! Domain rules for the taskflow workflow and approval engine.
//!
//! This crate is pure: it performs no I/O. The database layer
//! (`taskflow-db`) persists the records described here and the API layer
//! (`taskflow-api`) drives the transitions inside database transactions.

#[macro_use]
mod macros;

pub mod approval_request;
pub mod approvers;
pub mod error;
pub mod overdue;
pub mod pagination;
pub mod roles;
pub mod types;
pub mod workflow;
