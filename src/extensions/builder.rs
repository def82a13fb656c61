//! Build decisions.
//!
//! For each live spec, the builder publishes a status on every context that
//! still needs a build and triggers the runner job when a context becomes
//! `Queued`. A context left `Queued` by an earlier poll is triggered again
//! only when the runner holds no build of the job. A busy runner queue holds
//! builds back with a `Backed` status unless `always_queue` is set; the next
//! poll admits them.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::ExtensionError;
use super::comment::with_hidden_instruction;
use super::skip::{InvalidPattern, SkipRule};
use crate::bot::{ContextError, Current, Io};
use crate::effects::{EffectError, HostInterpreter, RunnerInterpreter};
use crate::instructions::{Instruction, InstructionKind};
use crate::types::{CommitStatus, JobSpec, StatusState, description, filter_not_built};

pub fn absorb(current: &mut Current, instruction: &Instruction) {
    match instruction.kind() {
        InstructionKind::Skip => {
            let (rule, invalid) = SkipRule::skip(&instruction.args);
            replace_rule(current, instruction, rule, invalid);
        }
        InstructionKind::Jobs => {
            let (rule, invalid) = SkipRule::jobs(&instruction.args);
            replace_rule(current, instruction, rule, invalid);
        }
        InstructionKind::Rebuild => {
            current.rebuild_failed = Some(instruction.date);
        }
        InstructionKind::ResetSkipErrors => {
            current.skip_errors.retain(|e| e.date >= instruction.date);
        }
        _ => {}
    }
}

fn replace_rule(
    current: &mut Current,
    instruction: &Instruction,
    rule: SkipRule,
    invalid: Vec<InvalidPattern>,
) {
    current.skip = rule;
    for pattern in invalid {
        warn!(pattern = %pattern.pattern, reason = %pattern.reason, "Invalid job pattern");
        current.skip_errors.push(ContextError {
            message: format!("Invalid pattern `{}`: {}", pattern.pattern, pattern.reason),
            date: instruction.date,
        });
    }
}

pub async fn decide<H, R>(current: &mut Current, io: &Io<'_, H, R>) -> Result<(), ExtensionError>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    if !current.skip_errors.is_empty() {
        report_skip_errors(current, io).await?;
    }

    let specs: Vec<JobSpec> = current.job_specs.values().cloned().collect();
    for spec in &specs {
        build(current, io, spec).await?;
    }
    Ok(())
}

async fn report_skip_errors<H, R>(current: &Current, io: &Io<'_, H, R>) -> Result<(), EffectError>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    let mut body = String::from("Some job patterns are invalid and were ignored:\n");
    for error in &current.skip_errors {
        body.push_str(&format!("\n- {}", error.message));
    }
    io.post_comment(&current.head.id, with_hidden_instruction(&body, "reset-skip-errors"))
        .await
}

async fn build<H, R>(current: &mut Current, io: &Io<'_, H, R>, spec: &JobSpec) -> Result<(), EffectError>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    let Some(job) = current.jobs.get(&spec.name).cloned() else {
        debug!(job = %spec.name, "No runner job, not building");
        return Ok(());
    };
    let contexts = job.list_contexts(spec);

    if !job.enabled {
        for context in &contexts {
            let status = CommitStatus::new(context, StatusState::Success, description::DISABLED)
                .with_target_url(job.url.clone());
            current.maybe_update_status(io, status).await?;
        }
        return Ok(());
    }

    if spec.config.periodic {
        debug!(job = %spec.name, "Periodic job, not building");
        return Ok(());
    }

    if let Some(only) = &spec.config.only
        && !only.as_slice().iter().any(|branch| current.head.matches_branch(branch))
    {
        debug!(job = %spec.name, "Branch not allowed, not building");
        return Ok(());
    }

    let not_built: Vec<String> = filter_not_built(&current.statuses, &contexts, current.rebuild_failed)
        .into_iter()
        .map(str::to_string)
        .collect();
    if not_built.is_empty() {
        return Ok(());
    }

    if current.skip.is_skipped(&spec.name) {
        for context in &not_built {
            let status = CommitStatus::new(context, StatusState::Success, description::SKIPPED)
                .with_target_url(job.url.clone());
            current.maybe_update_status(io, status).await?;
        }
        return Ok(());
    }

    let admitted = current.settings.always_queue || io.is_queue_empty().await?;
    let label = if admitted {
        description::QUEUED
    } else {
        description::BACKED
    };

    let mut newly_queued = false;
    for context in &not_built {
        let status = CommitStatus::new(context, StatusState::Pending, label)
            .with_target_url(job.url.clone());
        let pushed = current.maybe_update_status(io, status).await?;
        newly_queued |= pushed && admitted;
    }

    if !admitted {
        info!(job = %spec.name, "Runner queue is busy, build backed");
        return Ok(());
    }
    if !newly_queued {
        if build_in_flight(io, &spec.name).await? {
            debug!(job = %spec.name, "Build already queued");
            return Ok(());
        }
        info!(job = %spec.name, "Queued without a build on the runner, triggering again");
    }

    match io.trigger_build(&spec.name, build_params(current)).await {
        Ok(()) => info!(job = %spec.name, sha = %current.head.sha, "Triggered build"),
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => warn!(job = %spec.name, error = %e, "Failed to trigger build"),
    }
    Ok(())
}

/// Whether the runner holds a build of `job`, waiting or running.
async fn build_in_flight<H, R>(io: &Io<'_, H, R>, job: &str) -> Result<bool, EffectError>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    Ok(io.is_job_queued(job).await? || io.is_job_running(job).await?)
}

fn build_params(current: &Current) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("revision".to_string(), current.head.sha.to_string()),
        ("ref".to_string(), current.head.ref_name.clone()),
    ])
}
