//! Commit statuses published against a head's tip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// State of a commit status context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
}

impl StatusState {
    /// Returns true for `failure` and `error`.
    pub fn is_failed(&self) -> bool {
        matches!(self, StatusState::Failure | StatusState::Error)
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Failure => "failure",
            StatusState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Descriptions the reconciler itself publishes.
pub mod description {
    /// Waiting in the runner queue.
    pub const QUEUED: &str = "Queued";
    /// Held back because the runner queue is busy.
    pub const BACKED: &str = "Backed";
    /// Announced but not yet queued.
    pub const NEW: &str = "New";
    /// Excluded by a `skip` or `jobs` instruction.
    pub const SKIPPED: &str = "Skipped";
    /// The runner job is disabled.
    pub const DISABLED: &str = "Disabled";
}

/// A status context on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitStatus {
    pub context: String,
    pub state: StatusState,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CommitStatus {
    pub fn new(context: impl Into<String>, state: StatusState, description: impl Into<String>) -> Self {
        CommitStatus {
            context: context.into(),
            state,
            description: description.into(),
            target_url: None,
            updated_at: None,
        }
    }

    pub fn with_target_url(mut self, url: Option<String>) -> Self {
        self.target_url = url;
        self
    }

    /// Returns true if pushing `other` would change what reviewers see.
    pub fn differs_from(&self, other: &CommitStatus) -> bool {
        self.state != other.state || self.description != other.description
    }
}

/// Statuses of one commit, keyed by context name.
pub type Statuses = BTreeMap<String, CommitStatus>;

/// Returns the subset of `contexts` that still needs a build.
///
/// A context needs a build when it has no status, when it was announced or
/// queued but no build picked it up, when it was skipped, or when it failed
/// before `rebuild_failed`. Running builds, successes and fresh failures are
/// considered built.
pub fn filter_not_built<'a>(
    statuses: &Statuses,
    contexts: &'a [String],
    rebuild_failed: Option<DateTime<Utc>>,
) -> Vec<&'a str> {
    contexts
        .iter()
        .filter(|context| {
            let Some(status) = statuses.get(context.as_str()) else {
                return true;
            };
            match status.state {
                StatusState::Failure | StatusState::Error => match (rebuild_failed, status.updated_at) {
                    (Some(cutoff), Some(failed_at)) => failed_at <= cutoff,
                    (Some(_), None) => true,
                    (None, _) => false,
                },
                StatusState::Pending => matches!(
                    status.description.as_str(),
                    description::BACKED | description::NEW | description::QUEUED
                ),
                StatusState::Success => status.description == description::SKIPPED,
            }
        })
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 8, 11, hour, 0, 0).unwrap()
    }

    fn status(context: &str, state: StatusState, desc: &str, updated: Option<u32>) -> CommitStatus {
        CommitStatus {
            context: context.to_string(),
            state,
            description: desc.to_string(),
            target_url: None,
            updated_at: updated.map(at),
        }
    }

    #[test]
    fn filter_not_built_contexts() {
        let statuses: Statuses = [
            status("backed", StatusState::Pending, "Backed", None),
            status("errored", StatusState::Error, "", Some(10)),
            status("failed", StatusState::Failure, "", Some(10)),
            status("green", StatusState::Success, "Success!", None),
            status("newfailed", StatusState::Error, "", Some(20)),
            status("queued", StatusState::Pending, "Queued", None),
            status("running", StatusState::Pending, "build #789", None),
            status("skipped", StatusState::Success, "Skipped", Some(10)),
        ]
        .into_iter()
        .map(|s| (s.context.clone(), s))
        .collect();

        let contexts: Vec<String> = [
            "backed", "errored", "failed", "green", "newfailed", "notbuilt", "queued", "running",
            "skipped",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let not_built = filter_not_built(&statuses, &contexts, Some(at(16)));

        assert_eq!(
            not_built,
            vec!["backed", "errored", "failed", "notbuilt", "queued", "skipped"]
        );
    }

    #[test]
    fn failures_stay_built_without_rebuild() {
        let statuses: Statuses = [status("failed", StatusState::Failure, "", Some(10))]
            .into_iter()
            .map(|s| (s.context.clone(), s))
            .collect();
        let contexts = vec!["failed".to_string()];

        assert!(filter_not_built(&statuses, &contexts, None).is_empty());
    }

    #[test]
    fn differs_from_ignores_target_url() {
        let a = CommitStatus::new("job", StatusState::Pending, "Queued")
            .with_target_url(Some("http://a".into()));
        let b = CommitStatus::new("job", StatusState::Pending, "Queued");
        assert!(!a.differs_from(&b));
        let c = CommitStatus::new("job", StatusState::Pending, "Backed");
        assert!(a.differs_from(&c));
    }

    #[test]
    fn state_deserializes_lowercase() {
        let state: StatusState = serde_json::from_str("\"failure\"").unwrap();
        assert_eq!(state, StatusState::Failure);
        assert!(state.is_failed());
    }
}
