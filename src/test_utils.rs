//! Shared test fixtures and arbitrary generators for property-based testing.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use crate::instructions::Instruction;
use crate::types::{Build, BuildId, Head, HeadId, PrNumber, RepoId, Sha};

/// A fixed point in time, `hours` after the fixture epoch.
pub fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 8, 11, 0, 0, 0).unwrap() + chrono::Duration::hours(hours)
}

pub fn repo() -> RepoId {
    RepoId::new("owner", "repository")
}

/// A branch head whose tip was committed at `at(0)`.
pub fn branch_head(ref_name: &str, sha: &str) -> Head {
    let name = ref_name.strip_prefix("refs/heads/").unwrap_or(ref_name);
    Head {
        repo: repo(),
        id: HeadId::Branch(name.to_string()),
        ref_name: ref_name.to_string(),
        sha: Sha::new(sha),
        commit_date: at(0),
    }
}

/// A pull request head whose tip was committed at `at(0)`.
pub fn pr_head(number: u64, ref_name: &str, sha: &str) -> Head {
    Head {
        repo: repo(),
        id: HeadId::PullRequest(PrNumber(number)),
        ref_name: ref_name.to_string(),
        sha: Sha::new(sha),
        commit_date: at(0),
    }
}

pub fn instruction(name: &str, args: &[&str], date: DateTime<Utc>) -> Instruction {
    Instruction::new(
        name,
        args.iter().map(|a| a.to_string()).collect(),
        "bersace",
        date,
    )
}

/// A running build of `job` started `age` ago.
pub fn running_build(job: &str, id: u64, sha: &str, branch: &str, age: chrono::Duration) -> Build {
    Build {
        job: job.to_string(),
        id: BuildId(id),
        running: true,
        started_at: Utc::now() - age,
        revision: Sha::new(sha),
        revision_branches: vec![branch.to_string()],
        url: Some(format!("https://ci.example.com/job/{}/{}", job, id)),
    }
}

pub fn arb_job_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,20}".prop_map(String::from)
}

pub fn arb_sha() -> impl Strategy<Value = Sha> {
    "[0-9a-f]{40}".prop_map(Sha::new)
}
