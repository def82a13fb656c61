//! Effect interpreter traits.
//!
//! These traits define how effects are executed. The decision logic never
//! calls them directly: it hands effects to the pipeline's executor, which is
//! the only place real calls happen. Swapping an interpreter for a fake is
//! therefore enough to test any extension.

use std::future::Future;

use super::error::EffectError;
use super::host::{HostEffect, HostResponse};
use super::runner::{RunnerEffect, RunnerResponse};

/// Interprets review host effects.
///
/// Implementations are constructed for one repository, so all effects
/// executed through a single interpreter instance are scoped to it.
///
/// # Example (fake for testing)
///
/// ```ignore
/// struct NoComments;
///
/// impl HostInterpreter for NoComments {
///     type Error = EffectError;
///
///     async fn interpret(&self, effect: HostEffect) -> Result<HostResponse, Self::Error> {
///         match effect {
///             HostEffect::ListComments { .. } => Ok(HostResponse::Comments(vec![])),
///             other => Err(EffectError::api(format!("unexpected effect: {:?}", other))),
///         }
///     }
/// }
/// ```
pub trait HostInterpreter {
    /// The error type returned by this interpreter.
    type Error: Into<EffectError>;

    /// Execute a review host effect and return its response.
    fn interpret(
        &self,
        effect: HostEffect,
    ) -> impl Future<Output = Result<HostResponse, Self::Error>> + Send;
}

/// Interprets CI runner effects.
pub trait RunnerInterpreter {
    /// The error type returned by this interpreter.
    type Error: Into<EffectError>;

    /// Execute a runner effect and return its response.
    fn interpret(
        &self,
        effect: RunnerEffect,
    ) -> impl Future<Output = Result<RunnerResponse, Self::Error>> + Send;
}
