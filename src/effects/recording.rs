//! In-memory interpreters that serve queries from a fixed state and record
//! every effect they receive.
//!
//! They back the dry-run binary and the test suite: mutations are applied to
//! the in-memory state (a pushed status becomes visible to the next
//! `FetchStatuses`), so repeated runs observe the consequences of earlier ones.

use std::collections::{BTreeMap, BTreeSet};
use std::future::{Future, ready};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::EffectError;
use super::host::{CommentData, HostEffect, HostResponse, RepoSettings};
use super::interpreter::{HostInterpreter, RunnerInterpreter};
use super::runner::{RunnerEffect, RunnerResponse};
use crate::types::{Build, BuildId, CommitStatus, HeadId, Job, JobSpec, Sha, Statuses};

/// State served by [`RecordingHost`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostState {
    #[serde(default)]
    pub comments: Vec<CommentData>,
    #[serde(default)]
    pub statuses: BTreeMap<Sha, Statuses>,
    /// `None` answers `FetchSettings` with not-found.
    #[serde(default)]
    pub settings: Option<RepoSettings>,
    /// `None` answers `FetchJobSpecs` with not-found.
    #[serde(default)]
    pub job_specs: Option<BTreeMap<String, JobSpec>>,
    #[serde(default)]
    pub posted_comments: Vec<(HeadId, String)>,
}

/// Review host interpreter backed by [`HostState`].
#[derive(Debug, Default)]
pub struct RecordingHost {
    state: Mutex<HostState>,
    effects: Mutex<Vec<HostEffect>>,
}

impl RecordingHost {
    pub fn new(state: HostState) -> Self {
        RecordingHost {
            state: Mutex::new(state),
            effects: Mutex::new(Vec::new()),
        }
    }

    /// Applies `f` to the served state.
    pub fn update(&self, f: impl FnOnce(&mut HostState)) {
        f(&mut lock(&self.state));
    }

    /// Returns a copy of the served state.
    pub fn state(&self) -> HostState {
        lock(&self.state).clone()
    }

    /// Every effect received so far, in order.
    pub fn effects(&self) -> Vec<HostEffect> {
        lock(&self.effects).clone()
    }

    /// Statuses pushed so far, in order.
    pub fn pushed_statuses(&self) -> Vec<CommitStatus> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                HostEffect::PushStatus { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    /// Bodies of comments posted so far, in order.
    pub fn posted_comments(&self) -> Vec<String> {
        lock(&self.state)
            .posted_comments
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Forgets recorded effects, keeping the state.
    pub fn clear_effects(&self) {
        lock(&self.effects).clear();
    }

    fn handle(&self, effect: HostEffect) -> Result<HostResponse, EffectError> {
        debug!(?effect, "RecordingHost: effect recorded");
        lock(&self.effects).push(effect.clone());
        let mut state = lock(&self.state);

        match effect {
            HostEffect::ListComments { .. } => Ok(HostResponse::Comments(state.comments.clone())),
            HostEffect::FetchStatuses { sha } => Ok(HostResponse::Statuses(
                state.statuses.get(&sha).cloned().unwrap_or_default(),
            )),
            HostEffect::FetchSettings => state
                .settings
                .clone()
                .map(HostResponse::Settings)
                .ok_or_else(|| EffectError::not_found("settings")),
            HostEffect::FetchJobSpecs { .. } => state
                .job_specs
                .clone()
                .map(HostResponse::JobSpecs)
                .ok_or_else(|| EffectError::not_found("job specs")),
            HostEffect::PushStatus { sha, mut status } => {
                status.updated_at = Some(Utc::now());
                state
                    .statuses
                    .entry(sha)
                    .or_default()
                    .insert(status.context.clone(), status.clone());
                Ok(HostResponse::StatusPushed(status))
            }
            HostEffect::PostComment { head, body } => {
                state.posted_comments.push((head, body));
                Ok(HostResponse::CommentPosted)
            }
        }
    }
}

impl HostInterpreter for RecordingHost {
    type Error = EffectError;

    fn interpret(
        &self,
        effect: HostEffect,
    ) -> impl Future<Output = Result<HostResponse, Self::Error>> + Send {
        ready(self.handle(effect))
    }
}

/// State served by [`RecordingRunner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerState {
    #[serde(default)]
    pub jobs: BTreeMap<String, Job>,
    #[serde(default)]
    pub builds: Vec<Build>,
    #[serde(default = "queue_empty_by_default")]
    pub queue_empty: bool,
    /// Jobs whose creation and triggering fail with an API error.
    #[serde(default)]
    pub failing_jobs: BTreeSet<String>,
    #[serde(default)]
    pub triggered: Vec<(String, BTreeMap<String, String>)>,
    /// Jobs with a build waiting in the queue.
    #[serde(default)]
    pub queued: BTreeSet<String>,
}

fn queue_empty_by_default() -> bool {
    true
}

impl Default for RunnerState {
    fn default() -> Self {
        RunnerState {
            jobs: BTreeMap::new(),
            builds: Vec::new(),
            queue_empty: true,
            failing_jobs: BTreeSet::new(),
            triggered: Vec::new(),
            queued: BTreeSet::new(),
        }
    }
}

/// CI runner interpreter backed by [`RunnerState`].
#[derive(Debug, Default)]
pub struct RecordingRunner {
    state: Mutex<RunnerState>,
    effects: Mutex<Vec<RunnerEffect>>,
}

impl RecordingRunner {
    pub fn new(state: RunnerState) -> Self {
        RecordingRunner {
            state: Mutex::new(state),
            effects: Mutex::new(Vec::new()),
        }
    }

    /// Applies `f` to the served state.
    pub fn update(&self, f: impl FnOnce(&mut RunnerState)) {
        f(&mut lock(&self.state));
    }

    /// Returns a copy of the served state.
    pub fn state(&self) -> RunnerState {
        lock(&self.state).clone()
    }

    /// Every effect received so far, in order.
    pub fn effects(&self) -> Vec<RunnerEffect> {
        lock(&self.effects).clone()
    }

    /// Names of jobs whose build was successfully triggered, in order.
    pub fn triggered_jobs(&self) -> Vec<String> {
        lock(&self.state)
            .triggered
            .iter()
            .map(|(job, _)| job.clone())
            .collect()
    }

    /// Builds cancelled so far, in order.
    pub fn cancelled(&self) -> Vec<(String, BuildId)> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                RunnerEffect::CancelBuild { job, id } => Some((job, id)),
                _ => None,
            })
            .collect()
    }

    /// Forgets recorded effects, keeping the state.
    pub fn clear_effects(&self) {
        lock(&self.effects).clear();
    }

    fn handle(&self, effect: RunnerEffect) -> Result<RunnerResponse, EffectError> {
        debug!(?effect, "RecordingRunner: effect recorded");
        lock(&self.effects).push(effect.clone());
        let mut state = lock(&self.state);

        match effect {
            RunnerEffect::ListJobs => Ok(RunnerResponse::Jobs(state.jobs.values().cloned().collect())),
            RunnerEffect::IsQueueEmpty => Ok(RunnerResponse::Bool(state.queue_empty)),
            RunnerEffect::IsJobRunning { job } => Ok(RunnerResponse::Bool(
                state.builds.iter().any(|b| b.job == job && b.running),
            )),
            RunnerEffect::IsJobQueued { job } => Ok(RunnerResponse::Bool(state.queued.contains(&job))),
            RunnerEffect::ListBuildIds { job } => {
                let mut ids: Vec<BuildId> = state
                    .builds
                    .iter()
                    .filter(|b| b.job == job)
                    .map(|b| b.id)
                    .collect();
                ids.sort_by(|a, b| b.cmp(a));
                Ok(RunnerResponse::BuildIds(ids))
            }
            RunnerEffect::GetBuild { job, id } => state
                .builds
                .iter()
                .find(|b| b.job == job && b.id == id)
                .cloned()
                .map(RunnerResponse::Build)
                .ok_or_else(|| EffectError::not_found(format!("build {} {}", job, id))),
            RunnerEffect::CreateJob { spec } => {
                if state.failing_jobs.contains(&spec.name) {
                    return Err(EffectError::api_status(500, format!("cannot create {}", spec.name)));
                }
                let job = Job::new(spec.name.clone());
                state.jobs.insert(spec.name, job.clone());
                Ok(RunnerResponse::JobCreated(job))
            }
            RunnerEffect::TriggerBuild { job, params } => {
                if state.failing_jobs.contains(&job) {
                    return Err(EffectError::api_status(500, format!("cannot build {}", job)));
                }
                state.queued.insert(job.clone());
                state.triggered.push((job, params));
                Ok(RunnerResponse::BuildTriggered)
            }
            RunnerEffect::CancelBuild { job, id } => {
                let build = state
                    .builds
                    .iter_mut()
                    .find(|b| b.job == job && b.id == id)
                    .ok_or_else(|| EffectError::not_found(format!("build {} {}", job, id)))?;
                build.running = false;
                Ok(RunnerResponse::BuildCancelled)
            }
        }
    }
}

impl RunnerInterpreter for RecordingRunner {
    type Error = EffectError;

    fn interpret(
        &self,
        effect: RunnerEffect,
    ) -> impl Future<Output = Result<RunnerResponse, Self::Error>> + Send {
        ready(self.handle(effect))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
