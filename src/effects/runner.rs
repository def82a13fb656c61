//! CI runner effect types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Build, BuildId, Job, JobSpec};

/// A CI runner operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerEffect {
    // ─── Queries ──────────────────────────────────────────────────────────────
    /// List the runner jobs belonging to the repository.
    ListJobs,

    /// Ask whether the runner's build queue is empty.
    IsQueueEmpty,

    /// Ask whether a job has a build in progress.
    IsJobRunning { job: String },

    /// Ask whether a build of a job is waiting in the runner's queue.
    IsJobQueued { job: String },

    /// List the build numbers of a job, newest first.
    ListBuildIds { job: String },

    /// Fetch one build.
    GetBuild { job: String, id: BuildId },

    // ─── Mutations ────────────────────────────────────────────────────────────
    /// Create a runner job from a spec.
    CreateJob { spec: JobSpec },

    /// Queue a build of a job.
    TriggerBuild {
        job: String,
        params: BTreeMap<String, String>,
    },

    /// Abort a running build.
    CancelBuild { job: String, id: BuildId },
}

impl RunnerEffect {
    /// Returns true for effects that change state on the runner.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            RunnerEffect::CreateJob { .. }
                | RunnerEffect::TriggerBuild { .. }
                | RunnerEffect::CancelBuild { .. }
        )
    }
}

/// Response from a runner effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RunnerResponse {
    /// Response to `ListJobs`.
    Jobs(Vec<Job>),

    /// Response to `IsQueueEmpty`, `IsJobRunning` and `IsJobQueued`.
    Bool(bool),

    /// Response to `ListBuildIds`.
    BuildIds(Vec<BuildId>),

    /// Response to `GetBuild`.
    Build(Build),

    /// Response to `CreateJob`.
    JobCreated(Job),

    /// Response to `TriggerBuild`.
    BuildTriggered,

    /// Response to `CancelBuild`.
    BuildCancelled,
}
