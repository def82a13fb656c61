//! The reconciliation pipeline.
//!
//! [`Bot::run`] loads everything it needs about a head, folds the comments'
//! instructions into a fresh [`Current`], then runs every extension's decide
//! phase in registration order. An extension that fails is recorded as an
//! error on the head; the next extensions still run. Only a failure to load
//! the head or a cancellation aborts the run.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

mod current;
mod io;

pub use current::{ContextError, Current};
pub use io::Io;
pub(crate) use io::absent_if_not_found;

use crate::effects::{CommentData, EffectError, HostInterpreter, RunnerInterpreter};
use crate::extensions::Extension;
use crate::instructions::{Instruction, parse_instructions};
use crate::settings::Settings;
use crate::types::{Head, JobSpec};

/// Errors that abort a whole run.
///
/// The run is simply retried on the next poll.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to load {what} of {head}: {source}")]
    Load {
        head: String,
        what: &'static str,
        #[source]
        source: EffectError,
    },

    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    fn load(head: &Head, what: &'static str) -> impl FnOnce(EffectError) -> RunError {
        let head = head.to_string();
        move |source| {
            if source.is_cancelled() {
                RunError::Cancelled
            } else {
                RunError::Load { head, what, source }
            }
        }
    }
}

/// Runs extensions over heads.
#[derive(Debug, Clone)]
pub struct Bot {
    settings: Settings,
    extensions: Vec<Extension>,
}

impl Bot {
    /// A bot running every extension.
    pub fn new(settings: Settings) -> Self {
        Bot::with_extensions(settings, Extension::DEFAULT_ORDER.to_vec())
    }

    /// A bot running `extensions`, in order.
    pub fn with_extensions(settings: Settings, extensions: Vec<Extension>) -> Self {
        Bot {
            settings,
            extensions,
        }
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Extracts instructions from comments, oldest comment first.
    pub fn parse_instructions(comments: &[CommentData]) -> Vec<Instruction> {
        let mut comments: Vec<&CommentData> = comments.iter().collect();
        comments.sort_by_key(|comment| comment.date);
        comments
            .into_iter()
            .flat_map(|comment| parse_instructions(&comment.body, &comment.author, comment.date))
            .collect()
    }

    /// Feeds `instructions` to every extension.
    pub fn process_instructions(&self, current: &mut Current, instructions: &[Instruction]) {
        for instruction in instructions {
            debug!(name = %instruction.name, author = %instruction.author, "Processing instruction");
            if !instruction.kind().is_bookkeeping() {
                current.last_instruction_date = current
                    .last_instruction_date
                    .max(Some(instruction.date));
            }
            for extension in &self.extensions {
                extension.absorb(current, instruction);
            }
        }
    }

    /// Reconciles `head` and returns the final context.
    #[instrument(skip(self, head, io), fields(head = %head))]
    pub async fn run<H, R>(&self, head: Head, io: &Io<'_, H, R>) -> Result<Current, RunError>
    where
        H: HostInterpreter,
        R: RunnerInterpreter,
    {
        let mut current = self.load(head, io).await?;
        self.sync_jobs(&mut current, io).await?;

        for extension in &self.extensions {
            debug!(%extension, "Running extension");
            match extension.decide(&mut current, io).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {
                    info!(%extension, "Run cancelled");
                    return Err(RunError::Cancelled);
                }
                Err(e) => {
                    error!(%extension, error = %e, "Extension failed");
                    current.push_error(format!("{} failed: {}", extension, e));
                }
            }
        }
        Ok(current)
    }

    async fn load<H, R>(&self, head: Head, io: &Io<'_, H, R>) -> Result<Current, RunError>
    where
        H: HostInterpreter,
        R: RunnerInterpreter,
    {
        let settings = match io
            .fetch_settings()
            .await
            .map_err(RunError::load(&head, "settings"))?
        {
            Some(repo) => self.settings.with_repo(&repo),
            None => self.settings.clone(),
        };

        let job_specs = io
            .fetch_job_specs(&head.sha)
            .await
            .map_err(RunError::load(&head, "job specs"))?
            .unwrap_or_default();
        let jobs = io.list_jobs().await.map_err(RunError::load(&head, "jobs"))?;
        let statuses = io
            .fetch_statuses(&head.sha)
            .await
            .map_err(RunError::load(&head, "statuses"))?;
        let comments = io
            .list_comments(&head.id)
            .await
            .map_err(RunError::load(&head, "comments"))?;

        let mut current = Current::new(head, settings);
        current.job_specs = job_specs;
        current.jobs = jobs.into_iter().map(|job| (job.name.clone(), job)).collect();
        current.statuses = statuses;

        let instructions = Self::parse_instructions(&comments);
        self.process_instructions(&mut current, &instructions);
        Ok(current)
    }

    /// Creates runner jobs for new specs and specs for unmanaged runner jobs.
    async fn sync_jobs<H, R>(&self, current: &mut Current, io: &Io<'_, H, R>) -> Result<(), RunError>
    where
        H: HostInterpreter,
        R: RunnerInterpreter,
    {
        let missing: Vec<JobSpec> = current
            .job_specs
            .values()
            .filter(|spec| !current.jobs.contains_key(&spec.name))
            .cloned()
            .collect();

        for spec in missing {
            match io.create_job(spec.clone()).await {
                Ok(job) => {
                    info!(job = %job.name, "Created runner job");
                    current.jobs.insert(spec.name.clone(), job);
                }
                Err(e) if e.is_cancelled() => return Err(RunError::Cancelled),
                Err(e) => {
                    warn!(job = %spec.name, error = %e, "Failed to create runner job");
                    current.push_error(format!("Failed to create job {}: {}", spec.name, e));
                    current.job_specs.remove(&spec.name);
                }
            }
        }

        let unmanaged: BTreeMap<String, JobSpec> = current
            .jobs
            .keys()
            .filter(|name| !current.job_specs.contains_key(*name))
            .map(|name| (name.clone(), JobSpec::new(name.clone())))
            .collect();
        current.job_specs.extend(unmanaged);
        Ok(())
    }
}
