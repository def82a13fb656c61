//! Decision units run by the bot over a shared [`Current`].
//!
//! Every extension has two phases. `absorb` folds instructions into the
//! context, oldest first. `decide` reads the context and talks to the
//! collaborators through [`Io`]. The set of extensions is closed: adding one
//! means adding a variant here and a module next to this file.
//!
//! [`Current`]: crate::bot::Current
//! [`Io`]: crate::bot::Io

use std::fmt;

use thiserror::Error;

use crate::bot::{Current, Io};
use crate::effects::{EffectError, HostInterpreter, RunnerInterpreter};
use crate::instructions::Instruction;

pub mod autocancel;
pub mod builder;
pub mod canceller;
pub mod comment;
pub mod errors;
pub mod help;
pub mod report;
pub mod skip;
pub mod stages;

/// Error raised by an extension's decide phase.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error(transparent)]
    Effect(#[from] EffectError),

    #[error("{0}")]
    Invalid(String),
}

impl ExtensionError {
    /// Returns true if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtensionError::Effect(e) if e.is_cancelled())
    }
}

/// A registered extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Help,
    Stages,
    AutoCancel,
    Builder,
    Canceller,
    Report,
    Errors,
}

impl Extension {
    /// Every extension, in the order the bot runs them.
    ///
    /// Stages prune specs before the builder reads them, auto-cancel fills
    /// the queue the canceller drains, and errors go last so they include
    /// failures of every other extension.
    pub const DEFAULT_ORDER: [Extension; 7] = [
        Extension::Help,
        Extension::Stages,
        Extension::AutoCancel,
        Extension::Builder,
        Extension::Canceller,
        Extension::Report,
        Extension::Errors,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Extension::Help => "help",
            Extension::Stages => "stages",
            Extension::AutoCancel => "autocancel",
            Extension::Builder => "builder",
            Extension::Canceller => "canceller",
            Extension::Report => "report",
            Extension::Errors => "errors",
        }
    }

    /// Folds one instruction into the context.
    ///
    /// Instructions an extension does not understand are ignored.
    pub fn absorb(&self, current: &mut Current, instruction: &Instruction) {
        match self {
            Extension::Help => help::absorb(current, instruction),
            Extension::Builder => builder::absorb(current, instruction),
            Extension::Report => report::absorb(current, instruction),
            Extension::Errors => errors::absorb(current, instruction),
            Extension::Stages | Extension::AutoCancel | Extension::Canceller => {}
        }
    }

    /// Runs the decision logic.
    pub async fn decide<H, R>(&self, current: &mut Current, io: &Io<'_, H, R>) -> Result<(), ExtensionError>
    where
        H: HostInterpreter,
        R: RunnerInterpreter,
    {
        match self {
            Extension::Help => help::decide(current, io).await?,
            Extension::Stages => stages::decide(current)?,
            Extension::AutoCancel => autocancel::decide(current, io).await?,
            Extension::Builder => builder::decide(current, io).await?,
            Extension::Canceller => canceller::decide(current, io).await?,
            Extension::Report => report::decide(current, io).await?,
            Extension::Errors => errors::decide(current, io).await?,
        }
        Ok(())
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_run_before_builder() {
        let order = Extension::DEFAULT_ORDER;
        let position = |ext| order.iter().position(|e| *e == ext).unwrap();
        assert!(position(Extension::Stages) < position(Extension::Builder));
        assert!(position(Extension::AutoCancel) < position(Extension::Canceller));
        assert_eq!(order.last(), Some(&Extension::Errors));
    }

    #[test]
    fn cancellation_is_detected() {
        assert!(ExtensionError::from(EffectError::Cancelled).is_cancelled());
        assert!(!ExtensionError::Invalid("x".into()).is_cancelled());
    }
}
