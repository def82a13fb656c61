//! Effect execution with cancellation support.
//!
//! [`Io`] is the only way extensions reach the review host and the runner.
//! Every request goes through [`Io::host`] or [`Io::runner`], which check the
//! run's `CancellationToken` before the call and race the call against it.
//! A cancelled run therefore stops at the next effect boundary, never in the
//! middle of one.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::effects::{
    CommentData, EffectError, HostEffect, HostInterpreter, HostResponse, RepoSettings,
    RunnerEffect, RunnerInterpreter, RunnerResponse,
};
use crate::types::{Build, BuildId, CommitStatus, HeadId, Job, JobSpec, Sha, Statuses};

/// Executes effects for one run.
pub struct Io<'a, H, R> {
    host: &'a H,
    runner: &'a R,
    cancel: CancellationToken,
}

impl<'a, H, R> Io<'a, H, R>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    pub fn new(host: &'a H, runner: &'a R, cancel: CancellationToken) -> Self {
        Io {
            host,
            runner,
            cancel,
        }
    }

    /// Returns true if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Executes a review host effect.
    #[instrument(skip(self), fields(effect = ?effect))]
    pub async fn host(&self, effect: HostEffect) -> Result<HostResponse, EffectError> {
        if self.cancel.is_cancelled() {
            debug!("Cancellation detected before effect execution");
            return Err(EffectError::Cancelled);
        }
        trace!("Executing host effect");

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                debug!("Host effect cancelled");
                Err(EffectError::Cancelled)
            }
            result = self.host.interpret(effect) => result.map_err(Into::into),
        }
    }

    /// Executes a runner effect.
    #[instrument(skip(self), fields(effect = ?effect))]
    pub async fn runner(&self, effect: RunnerEffect) -> Result<RunnerResponse, EffectError> {
        if self.cancel.is_cancelled() {
            debug!("Cancellation detected before effect execution");
            return Err(EffectError::Cancelled);
        }
        trace!("Executing runner effect");

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                debug!("Runner effect cancelled");
                Err(EffectError::Cancelled)
            }
            result = self.runner.interpret(effect) => result.map_err(Into::into),
        }
    }

    async fn host_expect<T>(
        &self,
        effect: HostEffect,
        extract: impl FnOnce(HostResponse) -> Result<T, HostResponse>,
    ) -> Result<T, EffectError> {
        let request = effect.clone();
        let response = self.host(effect).await?;
        extract(response).map_err(|other| EffectError::unexpected(&request, &other))
    }

    async fn runner_expect<T>(
        &self,
        effect: RunnerEffect,
        extract: impl FnOnce(RunnerResponse) -> Result<T, RunnerResponse>,
    ) -> Result<T, EffectError> {
        let request = effect.clone();
        let response = self.runner(effect).await?;
        extract(response).map_err(|other| EffectError::unexpected(&request, &other))
    }

    // ─── Review host ──────────────────────────────────────────────────────────

    pub async fn list_comments(&self, head: &HeadId) -> Result<Vec<CommentData>, EffectError> {
        self.host_expect(HostEffect::ListComments { head: head.clone() }, |r| match r {
            HostResponse::Comments(comments) => Ok(comments),
            other => Err(other),
        })
        .await
    }

    pub async fn fetch_statuses(&self, sha: &Sha) -> Result<Statuses, EffectError> {
        self.host_expect(HostEffect::FetchStatuses { sha: sha.clone() }, |r| match r {
            HostResponse::Statuses(statuses) => Ok(statuses),
            other => Err(other),
        })
        .await
    }

    /// Fetches repository settings. `None` when the repository has none.
    pub async fn fetch_settings(&self) -> Result<Option<RepoSettings>, EffectError> {
        let result = self
            .host_expect(HostEffect::FetchSettings, |r| match r {
                HostResponse::Settings(settings) => Ok(settings),
                other => Err(other),
            })
            .await;
        absent_if_not_found(result)
    }

    /// Fetches the job specs declared at `sha`. `None` when nothing is declared.
    pub async fn fetch_job_specs(
        &self,
        sha: &Sha,
    ) -> Result<Option<BTreeMap<String, JobSpec>>, EffectError> {
        let result = self
            .host_expect(HostEffect::FetchJobSpecs { sha: sha.clone() }, |r| match r {
                HostResponse::JobSpecs(specs) => Ok(specs),
                other => Err(other),
            })
            .await;
        absent_if_not_found(result)
    }

    /// Publishes `status` on `sha` and returns it as the host recorded it.
    pub async fn push_status(&self, sha: &Sha, status: CommitStatus) -> Result<CommitStatus, EffectError> {
        self.host_expect(
            HostEffect::PushStatus {
                sha: sha.clone(),
                status,
            },
            |r| match r {
                HostResponse::StatusPushed(status) => Ok(status),
                other => Err(other),
            },
        )
        .await
    }

    pub async fn post_comment(&self, head: &HeadId, body: String) -> Result<(), EffectError> {
        self.host_expect(
            HostEffect::PostComment {
                head: head.clone(),
                body,
            },
            |r| match r {
                HostResponse::CommentPosted => Ok(()),
                other => Err(other),
            },
        )
        .await
    }

    // ─── Runner ───────────────────────────────────────────────────────────────

    pub async fn list_jobs(&self) -> Result<Vec<Job>, EffectError> {
        self.runner_expect(RunnerEffect::ListJobs, |r| match r {
            RunnerResponse::Jobs(jobs) => Ok(jobs),
            other => Err(other),
        })
        .await
    }

    pub async fn is_queue_empty(&self) -> Result<bool, EffectError> {
        self.runner_expect(RunnerEffect::IsQueueEmpty, |r| match r {
            RunnerResponse::Bool(empty) => Ok(empty),
            other => Err(other),
        })
        .await
    }

    pub async fn is_job_running(&self, job: &str) -> Result<bool, EffectError> {
        self.runner_expect(RunnerEffect::IsJobRunning { job: job.to_string() }, |r| match r {
            RunnerResponse::Bool(running) => Ok(running),
            other => Err(other),
        })
        .await
    }

    pub async fn is_job_queued(&self, job: &str) -> Result<bool, EffectError> {
        self.runner_expect(RunnerEffect::IsJobQueued { job: job.to_string() }, |r| match r {
            RunnerResponse::Bool(queued) => Ok(queued),
            other => Err(other),
        })
        .await
    }

    pub async fn list_build_ids(&self, job: &str) -> Result<Vec<BuildId>, EffectError> {
        self.runner_expect(RunnerEffect::ListBuildIds { job: job.to_string() }, |r| match r {
            RunnerResponse::BuildIds(ids) => Ok(ids),
            other => Err(other),
        })
        .await
    }

    pub async fn get_build(&self, job: &str, id: BuildId) -> Result<Build, EffectError> {
        self.runner_expect(
            RunnerEffect::GetBuild {
                job: job.to_string(),
                id,
            },
            |r| match r {
                RunnerResponse::Build(build) => Ok(build),
                other => Err(other),
            },
        )
        .await
    }

    pub async fn create_job(&self, spec: JobSpec) -> Result<Job, EffectError> {
        self.runner_expect(RunnerEffect::CreateJob { spec }, |r| match r {
            RunnerResponse::JobCreated(job) => Ok(job),
            other => Err(other),
        })
        .await
    }

    pub async fn trigger_build(
        &self,
        job: &str,
        params: BTreeMap<String, String>,
    ) -> Result<(), EffectError> {
        self.runner_expect(
            RunnerEffect::TriggerBuild {
                job: job.to_string(),
                params,
            },
            |r| match r {
                RunnerResponse::BuildTriggered => Ok(()),
                other => Err(other),
            },
        )
        .await
    }

    pub async fn cancel_build(&self, job: &str, id: BuildId) -> Result<(), EffectError> {
        self.runner_expect(
            RunnerEffect::CancelBuild {
                job: job.to_string(),
                id,
            },
            |r| match r {
                RunnerResponse::BuildCancelled => Ok(()),
                other => Err(other),
            },
        )
        .await
    }
}

/// Maps not-found onto `None`.
pub(crate) fn absent_if_not_found<T>(result: Result<T, EffectError>) -> Result<Option<T>, EffectError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
