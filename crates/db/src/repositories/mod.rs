//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods.

pub mod approval_request_repo;
pub mod event_repo;
pub mod project_repo;
pub mod task_repo;
pub mod user_repo;
pub mod workflow_instance_repo;
pub mod workflow_step_instance_repo;
pub mod workflow_step_repo;
pub mod workflow_template_repo;

pub use approval_request_repo::ApprovalRequestRepo;
pub use event_repo::EventRepo;
pub use project_repo::ProjectRepo;
pub use task_repo::TaskRepo;
pub use user_repo::UserRepo;
pub use workflow_instance_repo::WorkflowInstanceRepo;
pub use workflow_step_instance_repo::WorkflowStepInstanceRepo;
pub use workflow_step_repo::WorkflowStepRepo;
pub use workflow_template_repo::WorkflowTemplateRepo;
