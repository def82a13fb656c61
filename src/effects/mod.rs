//! Effects-as-data for review host and CI runner operations.
//!
//! This module defines effect types that describe operations without executing them.
//! This enables:
//! - Pure decision logic that yields effects as data
//! - Testability via fake interpreters
//! - Logging/tracing of intended operations in one place

use serde::{Deserialize, Serialize};

pub mod error;
pub mod host;
pub mod interpreter;
pub mod recording;
pub mod runner;

pub use error::EffectError;
pub use host::{CommentData, HostEffect, HostResponse, RepoSettings};
pub use interpreter::{HostInterpreter, RunnerInterpreter};
pub use recording::{HostState, RecordingHost, RecordingRunner, RunnerState};
pub use runner::{RunnerEffect, RunnerResponse};

/// A unified effect type encompassing both collaborators.
///
/// This is what the executor logs and what recording interpreters keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect_type", rename_all = "snake_case")]
pub enum Effect {
    /// A review host operation.
    Host(HostEffect),
    /// A CI runner operation.
    Runner(RunnerEffect),
}
