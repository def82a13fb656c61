//! Review heads: the branch tips and pull request heads being reconciled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{PrNumber, RepoId, Sha};

/// Identifies where comments for a head live on the review host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum HeadId {
    /// A protected branch; comments are attached to its tip commit.
    Branch(String),
    /// A pull request.
    PullRequest(PrNumber),
}

impl fmt::Display for HeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadId::Branch(name) => write!(f, "branch {}", name),
            HeadId::PullRequest(number) => write!(f, "PR {}", number),
        }
    }
}

/// A head to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    pub repo: RepoId,
    pub id: HeadId,
    /// Branch name of the head. May carry a `refs/heads/` prefix.
    pub ref_name: String,
    /// Current tip commit.
    pub sha: Sha,
    /// Commit date of the tip.
    pub commit_date: DateTime<Utc>,
}

impl Head {
    /// Returns true when this head is a branch rather than a pull request.
    pub fn is_branch(&self) -> bool {
        matches!(self.id, HeadId::Branch(_))
    }

    /// Branch name without the `refs/heads/` prefix.
    pub fn short_ref(&self) -> &str {
        short_branch(&self.ref_name)
    }

    /// Returns true if `name` designates this head's branch.
    ///
    /// Both sides are compared as short branch names, so `master`,
    /// `refs/heads/master` and `origin/master` all match a head on `master`.
    pub fn matches_branch(&self, name: &str) -> bool {
        let own = self.short_ref();
        let other = short_branch(name);
        other == own || other.strip_prefix("origin/") == Some(own)
    }
}

impl fmt::Display for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.repo, self.id, self.sha.short())
    }
}

fn short_branch(name: &str) -> &str {
    name.strip_prefix("refs/heads/")
        .or_else(|| name.strip_prefix("refs/remotes/"))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::branch_head;

    #[test]
    fn short_ref_strips_refs_heads() {
        let head = branch_head("refs/heads/pr", "d0d0");
        assert_eq!(head.short_ref(), "pr");
    }

    #[test]
    fn matches_branch_accepts_prefixed_forms() {
        let head = branch_head("refs/heads/master", "d0d0");
        assert!(head.matches_branch("master"));
        assert!(head.matches_branch("refs/heads/master"));
        assert!(head.matches_branch("origin/master"));
        assert!(head.matches_branch("refs/remotes/origin/master"));
    }

    #[test]
    fn matches_branch_rejects_other_branches() {
        let head = branch_head("branch", "d0d0");
        assert!(!head.matches_branch("origin/other"));
        assert!(!head.matches_branch("other/branch-2"));
        assert!(!head.matches_branch("master"));
    }

    #[test]
    fn head_kind() {
        let head = branch_head("master", "d0d0");
        assert!(head.is_branch());
    }
}
