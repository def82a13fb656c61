//! Detection of obsolete running builds.
//!
//! A build running on the head's branch for a commit other than the current
//! tip will never publish a useful status, so it is queued for cancellation.
//! Builds older than the cancel window are left alone. Jobs and builds the
//! runner no longer knows are skipped.

use tracing::{debug, info};

use crate::bot::{Current, Io, absent_if_not_found};
use crate::effects::{EffectError, HostInterpreter, RunnerInterpreter};

pub async fn decide<H, R>(current: &mut Current, io: &Io<'_, H, R>) -> Result<(), EffectError>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    let window = chrono::Duration::from_std(current.settings.cancel_window)
        .unwrap_or(chrono::Duration::MAX);
    let now = chrono::Utc::now();

    let names: Vec<String> = current.jobs.keys().cloned().collect();
    for name in names {
        if absent_if_not_found(io.is_job_running(&name).await)? != Some(true) {
            continue;
        }
        let Some(ids) = absent_if_not_found(io.list_build_ids(&name).await)? else {
            debug!(job = %name, "Job vanished from the runner");
            continue;
        };

        for id in ids {
            let Some(build) = absent_if_not_found(io.get_build(&name, id).await)? else {
                debug!(job = %name, build = %id, "Build vanished from the runner");
                continue;
            };
            if !build.running {
                continue;
            }
            if now.signed_duration_since(build.started_at) > window {
                debug!(job = %name, build = %id, "Build too old, left alone");
                continue;
            }
            if !build
                .revision_branches
                .iter()
                .any(|branch| current.head.matches_branch(branch))
            {
                continue;
            }
            if build.revision == current.head.sha {
                continue;
            }

            info!(job = %name, build = %id, revision = %build.revision.short(), "Queuing outdated build for cancellation");
            current.cancel_queue.push(build);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{RecordingHost, RecordingRunner, RunnerEffect, RunnerResponse};
    use crate::settings::Settings;
    use crate::test_utils::{branch_head, running_build};
    use crate::types::{Build, BuildId, Job};
    use chrono::Duration;
    use std::future::Future;
    use tokio_util::sync::CancellationToken;

    /// Lists `gone` among the builds of every job but cannot fetch it, like
    /// a runner that rotated the build away in between.
    struct RotatingRunner {
        inner: RecordingRunner,
        gone: BuildId,
    }

    impl RunnerInterpreter for RotatingRunner {
        type Error = EffectError;

        fn interpret(
            &self,
            effect: RunnerEffect,
        ) -> impl Future<Output = Result<RunnerResponse, Self::Error>> + Send {
            async move {
                match effect {
                    RunnerEffect::ListBuildIds { job } => {
                        match self.inner.interpret(RunnerEffect::ListBuildIds { job }).await? {
                            RunnerResponse::BuildIds(mut ids) => {
                                ids.insert(0, self.gone);
                                Ok(RunnerResponse::BuildIds(ids))
                            }
                            other => Ok(other),
                        }
                    }
                    RunnerEffect::GetBuild { job, id } if id == self.gone => {
                        Err(EffectError::not_found(format!("build {} {}", job, id)))
                    }
                    other => self.inner.interpret(other).await,
                }
            }
        }
    }

    async fn queued_for(builds: Vec<Build>) -> (Vec<Build>, RecordingRunner) {
        let host = RecordingHost::default();
        let runner = RecordingRunner::default();
        runner.update(|s| s.builds = builds);

        let mut current = Current::new(branch_head("branch", "bab1"), Settings::default());
        current.jobs.insert("job".into(), Job::new("job"));

        let io = Io::new(&host, &runner, CancellationToken::new());
        decide(&mut current, &io).await.unwrap();
        (current.cancel_queue, runner)
    }

    #[tokio::test]
    async fn skip_job_not_running() {
        let (queue, runner) = queued_for(vec![]).await;
        assert!(queue.is_empty());
        assert_eq!(runner.effects().len(), 1);
    }

    #[tokio::test]
    async fn skip_build_not_running() {
        let mut finished = running_build("job", 1, "01d", "origin/branch", Duration::minutes(5));
        finished.running = false;
        let running_elsewhere = running_build("job", 2, "01d", "origin/other", Duration::minutes(5));

        let (queue, _) = queued_for(vec![finished, running_elsewhere]).await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn skip_outdated() {
        let old = running_build("job", 1, "01d", "origin/branch", Duration::hours(7));
        let (queue, _) = queued_for(vec![old]).await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn skip_other_branch() {
        let other = running_build("job", 1, "01d", "origin/other", Duration::minutes(5));
        let (queue, _) = queued_for(vec![other]).await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn skip_current_sha() {
        let current = running_build("job", 1, "bab1", "origin/branch", Duration::minutes(5));
        let (queue, _) = queued_for(vec![current]).await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn cancel() {
        let stale = running_build("job", 1, "01d", "origin/branch", Duration::minutes(5));
        let (queue, runner) = queued_for(vec![stale]).await;

        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id.0, 1);
        // Queuing is not cancelling.
        assert!(runner.cancelled().is_empty());
    }

    #[tokio::test]
    async fn vanished_build_does_not_stop_the_pass() {
        let host = RecordingHost::default();
        let runner = RotatingRunner {
            inner: RecordingRunner::default(),
            gone: BuildId(9),
        };
        let stale = running_build("job", 1, "01d", "origin/branch", Duration::minutes(5));
        runner.inner.update(|s| s.builds = vec![stale]);

        let mut current = Current::new(branch_head("branch", "bab1"), Settings::default());
        current.jobs.insert("job".into(), Job::new("job"));
        let io = Io::new(&host, &runner, CancellationToken::new());

        decide(&mut current, &io).await.unwrap();

        assert_eq!(current.cancel_queue.len(), 1);
        assert_eq!(current.cancel_queue[0].id, BuildId(1));
    }
}
