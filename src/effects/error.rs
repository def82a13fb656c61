//! Collaborator error types.
//!
//! Interpreters map their transport failures onto [`EffectError`]. The
//! distinction that matters to decision logic is between "not found", which
//! callers usually treat as absence, and every other API failure.

use thiserror::Error;

/// Error returned when executing an effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    /// The requested resource does not exist (HTTP 404 or equivalent).
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other collaborator failure.
    #[error("API error: {message}")]
    Api {
        /// HTTP status code, when the collaborator reported one.
        status_code: Option<u16>,
        message: String,
    },

    /// The interpreter answered with a response of the wrong shape.
    #[error("unexpected response to {effect}: {response}")]
    UnexpectedResponse { effect: String, response: String },

    /// The run was cancelled before the effect was executed.
    #[error("operation cancelled")]
    Cancelled,
}

impl EffectError {
    pub fn not_found(what: impl Into<String>) -> Self {
        EffectError::NotFound(what.into())
    }

    pub fn api(message: impl Into<String>) -> Self {
        EffectError::Api {
            status_code: None,
            message: message.into(),
        }
    }

    pub fn api_status(status_code: u16, message: impl Into<String>) -> Self {
        EffectError::Api {
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    pub(crate) fn unexpected(effect: &impl std::fmt::Debug, response: &impl std::fmt::Debug) -> Self {
        EffectError::UnexpectedResponse {
            effect: format!("{:?}", effect),
            response: format!("{:?}", response),
        }
    }

    /// Returns true if the resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EffectError::NotFound(_))
    }

    /// Returns true if this is a cancellation error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EffectError::Cancelled)
    }
}
