//! Job specifications, stages, and the runner's view of jobs and builds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BuildId, Sha};

/// A value that may be written either as a single item or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }
}

/// Declarative configuration of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobConfig {
    /// Stage the job belongs to. Defaults to the `test` stage, or the first
    /// declared stage when there is no `test` stage.
    #[serde(default)]
    pub stage: Option<String>,
    /// Scheduled-only job; never triggered on ordinary polls.
    #[serde(default)]
    pub periodic: bool,
    /// Branches on which the builder may trigger this job.
    #[serde(default)]
    pub only: Option<OneOrMany<String>>,
    /// Branches on which this job exists at all.
    #[serde(default)]
    pub branches: Option<Vec<String>>,
    /// Additional status contexts the job publishes.
    #[serde(default)]
    pub external: Vec<String>,
}

/// A job specification, as declared by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub config: JobConfig,
}

impl JobSpec {
    /// A spec with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        JobSpec {
            name: name.into(),
            config: JobConfig::default(),
        }
    }

    pub fn with_config(name: impl Into<String>, config: JobConfig) -> Self {
        JobSpec {
            name: name.into(),
            config,
        }
    }
}

/// An ordered gate grouping job specs.
///
/// Deserializes from a bare stage name or from `{name, external}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StageRepr")]
pub struct Stage {
    pub name: String,
    /// Status contexts published by something other than the runner that
    /// must succeed before the stage is complete.
    pub external: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StageRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        external: Vec<String>,
    },
}

impl From<StageRepr> for Stage {
    fn from(repr: StageRepr) -> Self {
        match repr {
            StageRepr::Name(name) => Stage::new(name),
            StageRepr::Full { name, external } => Stage { name, external },
        }
    }
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Stage {
            name: name.into(),
            external: Vec::new(),
        }
    }
}

/// Snapshot of a runner job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    /// Status contexts this job publishes. Empty means the job name.
    #[serde(default)]
    pub contexts: Vec<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Job {
            name: name.into(),
            enabled: true,
            url: None,
            contexts: Vec::new(),
        }
    }

    /// Status contexts published by this job for `spec`.
    pub fn list_contexts(&self, spec: &JobSpec) -> Vec<String> {
        let mut contexts = if self.contexts.is_empty() {
            vec![self.name.clone()]
        } else {
            self.contexts.clone()
        };
        contexts.extend(spec.config.external.iter().cloned());
        contexts
    }
}

/// A build of a runner job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub job: String,
    pub id: BuildId,
    pub running: bool,
    pub started_at: DateTime<Utc>,
    /// Commit the build checked out.
    pub revision: Sha,
    /// Branches the checked out revision was fetched from, e.g. `origin/pr`.
    #[serde(default)]
    pub revision_branches: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}
