//! Workflow sequencing behind the `bb-release` binary

pub mod orchestration;

pub use orchestration::{run_release_workflow, ReleaseWorkflowArgs, WorkflowResult};
