//! Per-run context shared by the extensions.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::io::Io;
use crate::effects::{EffectError, HostInterpreter, RunnerInterpreter};
use crate::extensions::skip::SkipRule;
use crate::settings::Settings;
use crate::types::{Build, CommitStatus, Head, Job, JobSpec, Stage, StatusState, Statuses};

/// An error to report on the head.
///
/// The date is the date of the instruction that most proximately caused
/// it, so that a later `reset-errors` can clear it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextError {
    pub message: String,
    pub date: DateTime<Utc>,
}

/// Everything one run knows about a head.
///
/// Built fresh for each run and discarded afterwards. Only the run that owns
/// it reads or writes it.
#[derive(Debug)]
pub struct Current {
    pub head: Head,
    /// Process settings with repository overrides applied.
    pub settings: Settings,
    /// Specs still live for this run. Pruned by the stage engine.
    pub job_specs: BTreeMap<String, JobSpec>,
    pub jobs: BTreeMap<String, Job>,
    pub statuses: Statuses,
    pub skip: SkipRule,
    pub skip_errors: Vec<ContextError>,
    pub errors: Vec<ContextError>,
    pub errors_reset_at: Option<DateTime<Utc>>,
    /// Builds made obsolete by a newer commit, waiting for cancellation.
    pub cancel_queue: Vec<Build>,
    pub current_stage: Option<Stage>,
    /// Failed contexts last updated before this date are built again.
    pub rebuild_failed: Option<DateTime<Utc>>,
    /// Logins that asked for help.
    pub help_mentions: BTreeSet<String>,
    pub report_done: bool,
    /// Date of the latest instruction that asked for work.
    pub last_instruction_date: Option<DateTime<Utc>>,
}

impl Current {
    pub fn new(head: Head, settings: Settings) -> Self {
        Current {
            head,
            settings,
            job_specs: BTreeMap::new(),
            jobs: BTreeMap::new(),
            statuses: Statuses::new(),
            skip: SkipRule::None,
            skip_errors: Vec::new(),
            errors: Vec::new(),
            errors_reset_at: None,
            cancel_queue: Vec::new(),
            current_stage: None,
            rebuild_failed: None,
            help_mentions: BTreeSet::new(),
            report_done: false,
            last_instruction_date: None,
        }
    }

    /// Date given to errors raised now.
    ///
    /// The latest work instruction, or the head commit when it is newer.
    pub fn error_date(&self) -> DateTime<Utc> {
        match self.last_instruction_date {
            Some(date) if date > self.head.commit_date => date,
            _ => self.head.commit_date,
        }
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        let error = ContextError {
            message: message.into(),
            date: self.error_date(),
        };
        debug!(message = %error.message, date = %error.date, "Recorded error");
        self.errors.push(error);
    }

    /// Status contexts `spec` publishes.
    pub fn contexts_for(&self, spec: &JobSpec) -> Vec<String> {
        match self.jobs.get(&spec.name) {
            Some(job) => job.list_contexts(spec),
            None => Job::new(spec.name.clone()).list_contexts(spec),
        }
    }

    /// Returns true if every context in `contexts` is successful.
    pub fn all_succeeded<'a>(&self, mut contexts: impl Iterator<Item = &'a String>) -> bool {
        contexts.all(|context| {
            self.statuses
                .get(context)
                .is_some_and(|status| status.state == StatusState::Success)
        })
    }

    /// Pushes `status` unless the head already shows the same state and
    /// description.
    ///
    /// Returns true if a status was pushed.
    pub async fn maybe_update_status<H, R>(
        &mut self,
        io: &Io<'_, H, R>,
        status: CommitStatus,
    ) -> Result<bool, EffectError>
    where
        H: HostInterpreter,
        R: RunnerInterpreter,
    {
        if let Some(known) = self.statuses.get(&status.context)
            && !status.differs_from(known)
        {
            return Ok(false);
        }

        info!(
            context = %status.context,
            state = %status.state,
            description = %status.description,
            "Setting status"
        );
        let pushed = io.push_status(&self.head.sha, status).await?;
        self.statuses.insert(pushed.context.clone(), pushed);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{RecordingHost, RecordingRunner};
    use crate::test_utils::{at, branch_head};
    use crate::types::{JobConfig, description};
    use tokio_util::sync::CancellationToken;

    fn current() -> Current {
        Current::new(branch_head("master", "d0d0"), Settings::default())
    }

    #[test]
    fn error_date_prefers_latest() {
        let mut current = current();
        assert_eq!(current.error_date(), at(0));

        current.last_instruction_date = Some(at(2));
        assert_eq!(current.error_date(), at(2));

        current.head.commit_date = at(3);
        assert_eq!(current.error_date(), at(3));
    }

    #[test]
    fn contexts_without_runner_job() {
        let current = current();
        let spec = JobSpec::with_config(
            "app",
            JobConfig {
                external: vec!["coverage".into()],
                ..JobConfig::default()
            },
        );
        assert_eq!(current.contexts_for(&spec), vec!["app", "coverage"]);
    }

    #[tokio::test]
    async fn same_status_is_not_pushed_twice() {
        let host = RecordingHost::default();
        let runner = RecordingRunner::default();
        let io = Io::new(&host, &runner, CancellationToken::new());
        let mut current = current();

        let queued = CommitStatus::new("app", StatusState::Pending, description::QUEUED);
        assert!(current.maybe_update_status(&io, queued.clone()).await.unwrap());
        assert!(!current.maybe_update_status(&io, queued).await.unwrap());

        let skipped = CommitStatus::new("app", StatusState::Success, description::SKIPPED);
        assert!(current.maybe_update_status(&io, skipped).await.unwrap());

        assert_eq!(host.pushed_statuses().len(), 2);
        assert!(current.statuses["app"].updated_at.is_some());
    }
}
