//! Review host effect types.
//!
//! These describe review host operations as data. Interpreters are
//! repo-scoped, so effects don't carry the repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{CommitStatus, HeadId, JobSpec, Sha, Stage, Statuses};

/// A review host operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEffect {
    // ─── Queries ──────────────────────────────────────────────────────────────
    /// List comments on a head, oldest first.
    ListComments { head: HeadId },

    /// Fetch the statuses of a commit.
    FetchStatuses { sha: Sha },

    /// Fetch the repository's reconciler settings.
    FetchSettings,

    /// Fetch the job specs declared at a commit.
    FetchJobSpecs { sha: Sha },

    // ─── Mutations ────────────────────────────────────────────────────────────
    /// Publish a status on a commit.
    PushStatus { sha: Sha, status: CommitStatus },

    /// Post a comment on a head.
    PostComment { head: HeadId, body: String },
}

impl HostEffect {
    /// Returns true for effects that change state on the host.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            HostEffect::PushStatus { .. } | HostEffect::PostComment { .. }
        )
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// A comment as returned by the review host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentData {
    pub author: String,
    pub body: String,
    /// Last update of the comment. Instructions are dated with it.
    pub date: DateTime<Utc>,
}

/// Repository-level settings. Absent fields fall back to process settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSettings {
    #[serde(default)]
    pub stages: Option<Vec<Stage>>,
    #[serde(default)]
    pub always_queue: Option<bool>,
}

/// Response from a review host effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HostResponse {
    /// Response to `ListComments`.
    Comments(Vec<CommentData>),

    /// Response to `FetchStatuses`.
    Statuses(Statuses),

    /// Response to `FetchSettings`.
    Settings(RepoSettings),

    /// Response to `FetchJobSpecs`.
    JobSpecs(BTreeMap<String, JobSpec>),

    /// Response to `PushStatus`, with the host's timestamp filled in.
    StatusPushed(CommitStatus),

    /// Response to `PostComment`.
    CommentPosted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrNumber, StatusState};

    #[test]
    fn mutations() {
        assert!(
            HostEffect::PostComment {
                head: HeadId::PullRequest(PrNumber(1)),
                body: "hi".into()
            }
            .is_mutation()
        );
        assert!(
            HostEffect::PushStatus {
                sha: Sha::new("d0d0"),
                status: CommitStatus::new("job", StatusState::Pending, "Queued"),
            }
            .is_mutation()
        );
        assert!(!HostEffect::FetchSettings.is_mutation());
    }

    #[test]
    fn effect_serializes_with_type_tag() {
        let json = serde_json::to_value(HostEffect::FetchStatuses { sha: Sha::new("d0d0") }).unwrap();
        assert_eq!(json["type"], "fetch_statuses");
        assert_eq!(json["sha"], "d0d0");
    }

    #[test]
    fn settings_fields_are_optional() {
        let settings: RepoSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, RepoSettings::default());
    }
}
