//! Stage progression.
//!
//! Stages are ordered gates. A stage is complete once every context of its
//! specs and every external context it declares is successful. The current
//! stage is the first incomplete one, or the last stage when all are
//! complete. Specs of later stages are dropped from the run, so the builder
//! never triggers them early.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::ExtensionError;
use crate::bot::Current;
use crate::types::{JobSpec, Stage};

/// Name of the stage that owns specs without an explicit stage.
const DEFAULT_STAGE: &str = "test";

/// Computes `current_stage` and prunes `job_specs` accordingly.
///
/// Fails without touching the context when a stage is declared twice.
pub fn decide(current: &mut Current) -> Result<(), ExtensionError> {
    let stages = current.settings.stages.clone();
    let mut seen = BTreeSet::new();
    if let Some(duplicate) = stages.iter().find(|stage| !seen.insert(stage.name.as_str())) {
        return Err(ExtensionError::Invalid(format!(
            "Stage {} is declared more than once.",
            duplicate.name
        )));
    }

    let specs = std::mem::take(&mut current.job_specs);
    if stages.is_empty() {
        current.job_specs = specs
            .into_iter()
            .filter(|(_, spec)| !spec.config.periodic && runs_on_head(current, spec))
            .collect();
        current.current_stage = None;
        return Ok(());
    }

    let mut by_stage: BTreeMap<String, Vec<JobSpec>> = BTreeMap::new();
    for spec in specs.into_values() {
        if !runs_on_head(current, &spec) {
            debug!(job = %spec.name, "Job not enabled on this branch");
            continue;
        }

        let Some(stage) = stage_of(&spec, &stages) else {
            debug!(job = %spec.name, "Periodic job without stage, ignored");
            continue;
        };
        if !stages.iter().any(|s| s.name == stage) {
            warn!(job = %spec.name, stage = %stage, "Job assigned to undeclared stage");
            current.push_error(format!("Job {} is assigned to unknown stage {}.", spec.name, stage));
            continue;
        }
        by_stage.entry(stage).or_default().push(spec);
    }

    let index = current_index(current, &stages, &by_stage);
    let stage = &stages[index];
    debug!(stage = %stage.name, "Current stage");

    for (position, declared) in stages.iter().enumerate() {
        if position > index {
            break;
        }
        for spec in by_stage.remove(&declared.name).unwrap_or_default() {
            // Scheduled jobs run only when their own stage is reached.
            if spec.config.periodic && position != index {
                continue;
            }
            current.job_specs.insert(spec.name.clone(), spec);
        }
    }
    current.current_stage = Some(stage.clone());
    Ok(())
}

/// A `branches` list names short branch names, matched exactly.
fn runs_on_head(current: &Current, spec: &JobSpec) -> bool {
    let branch = current.head.short_ref();
    spec.config
        .branches
        .as_ref()
        .is_none_or(|branches| branches.iter().any(|name| name == branch))
}

/// Stage a spec belongs to. Periodic specs belong to a stage only when
/// they name one.
fn stage_of(spec: &JobSpec, stages: &[Stage]) -> Option<String> {
    if let Some(stage) = &spec.config.stage {
        return Some(stage.clone());
    }
    if spec.config.periodic {
        return None;
    }
    let default = stages
        .iter()
        .find(|s| s.name == DEFAULT_STAGE)
        .or_else(|| stages.first())?;
    Some(default.name.clone())
}

fn current_index(
    current: &Current,
    stages: &[Stage],
    by_stage: &BTreeMap<String, Vec<JobSpec>>,
) -> usize {
    let incomplete = stages.iter().position(|stage| {
        let specs = by_stage.get(&stage.name).map(Vec::as_slice).unwrap_or_default();
        let jobs_done = specs
            .iter()
            .all(|spec| current.all_succeeded(current.contexts_for(spec).iter()));
        !(jobs_done && current.all_succeeded(stage.external.iter()))
    });
    incomplete.unwrap_or(stages.len() - 1)
}
