//! Core domain types for the reconciler.
//!
//! Identifiers, review heads, commit statuses, and the job and build
//! payloads exchanged with the review host and the CI runner.

pub mod head;
pub mod ids;
pub mod job;
pub mod status;

// Re-export commonly used types at the module level
pub use head::{Head, HeadId};
pub use ids::{BuildId, PrNumber, RepoId, Sha};
pub use job::{Build, Job, JobConfig, JobSpec, OneOrMany, Stage};
pub use status::{CommitStatus, StatusState, Statuses, description, filter_not_built};
