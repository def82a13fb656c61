//! Instruction types extracted from review comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A structured command found in a comment.
///
/// Instructions are immutable. Extensions receive them oldest first; later
/// instructions override state set by earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub author: String,
    pub date: DateTime<Utc>,
}

/// The instruction names extensions understand.
///
/// Names are matched case-insensitively. Anything else is `Unknown` and is
/// ignored by every extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    /// `skip` / `skip <patterns...>`
    Skip,
    /// `jobs <patterns...>`
    Jobs,
    /// `rebuild`
    Rebuild,
    /// `reset-errors`
    ResetErrors,
    /// `reset-skip-errors`
    ResetSkipErrors,
    /// `help` or `man`
    Help,
    /// `help-reset`
    HelpReset,
    /// `report-done`
    ReportDone,
    Unknown,
}

impl InstructionKind {
    /// Returns true for instructions the bot writes into its own comments.
    ///
    /// These acknowledge a report rather than ask for work, so they do not
    /// date new errors.
    pub fn is_bookkeeping(&self) -> bool {
        matches!(
            self,
            InstructionKind::ResetErrors
                | InstructionKind::ResetSkipErrors
                | InstructionKind::HelpReset
                | InstructionKind::ReportDone
        )
    }
}

impl Instruction {
    pub fn new(
        name: impl Into<String>,
        args: Vec<String>,
        author: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Instruction {
            name: name.into(),
            args,
            author: author.into(),
            date,
        }
    }

    pub fn kind(&self) -> InstructionKind {
        match self.name.to_ascii_lowercase().as_str() {
            "skip" => InstructionKind::Skip,
            "jobs" => InstructionKind::Jobs,
            "rebuild" => InstructionKind::Rebuild,
            "reset-errors" => InstructionKind::ResetErrors,
            "reset-skip-errors" => InstructionKind::ResetSkipErrors,
            "help" | "man" => InstructionKind::Help,
            "help-reset" => InstructionKind::HelpReset,
            "report-done" => InstructionKind::ReportDone,
            _ => InstructionKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Instruction {
        Instruction::new(name, vec![], "someone", Utc::now())
    }

    #[test]
    fn kind_is_case_insensitive() {
        assert_eq!(named("SKIP").kind(), InstructionKind::Skip);
        assert_eq!(named("Jobs").kind(), InstructionKind::Jobs);
    }

    #[test]
    fn man_is_help() {
        assert_eq!(named("man").kind(), InstructionKind::Help);
        assert_eq!(named("help").kind(), InstructionKind::Help);
    }

    #[test]
    fn unknown_names_are_unknown() {
        assert_eq!(named("colored").kind(), InstructionKind::Unknown);
        assert!(!InstructionKind::Unknown.is_bookkeeping());
    }

    #[test]
    fn bookkeeping_kinds() {
        assert!(named("reset-errors").kind().is_bookkeeping());
        assert!(named("report-done").kind().is_bookkeeping());
        assert!(!named("rebuild").kind().is_bookkeeping());
    }
}
