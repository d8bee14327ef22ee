//! The enrollment progress and completion engine, plus clients for the
//! external collaborators it drives (document renderer, durable object
//! store, mail delivery).

pub mod certificate;
pub mod completion;
pub mod email;
pub mod progress;
pub mod quiz;
pub mod renderer;
pub mod storage;

#[cfg(test)]
pub(crate) mod testkit;

use axum::http::StatusCode;

/// Errors produced by the progress engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed or out-of-range input, rejected before any state mutation.
    /// `field` names the offending part of the payload.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// Enrollment, course, section, or quiz missing.
    #[error("{0} not found")]
    NotFound(String),

    /// Renderer, object store, or notifier failure. Issuance aborts and is
    /// retried on the next completion-triggering event.
    #[error("external service error: {0}")]
    External(String),

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// A state the engine's invariants say cannot happen. Logged loudly; the
    /// system stays in its last-known-consistent state.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// HTTP status a handler should answer with when surfacing this error.
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::Validation { .. } => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::External(_) => StatusCode::BAD_GATEWAY,
            EngineError::Db(_) | EngineError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
