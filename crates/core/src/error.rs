//! Error taxonomy from spec §7. Kept separate from the `anyhow::Result` used
//! internally for fallible setup work (client construction, discovery), the
//! same split this workspace already draws at its API crate boundary.

use thiserror::Error;

use crate::scope::ScopeError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FanoutError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("not-initialised: manager not wired yet")]
    NotInitialised,
    #[error("permission-denied: {0}")]
    PermissionDenied(String),
    #[error("limit-exceeded: {0}")]
    LimitExceeded(String),
    #[error("backpressure: {0}")]
    Backpressure(String),
    #[error("upstream: {0}")]
    Upstream(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl FanoutError {
    /// Taxonomy kind name (spec §7 table), used for telemetry tagging.
    pub fn kind(&self) -> &'static str {
        match self {
            FanoutError::Validation(_) => "validation",
            FanoutError::NotInitialised => "not-initialised",
            FanoutError::PermissionDenied(_) => "permission-denied",
            FanoutError::LimitExceeded(_) => "limit-exceeded",
            FanoutError::Backpressure(_) => "backpressure",
            FanoutError::Upstream(_) => "upstream",
            FanoutError::Transport(_) => "transport",
            FanoutError::Fatal(_) => "fatal",
        }
    }
}

impl From<ScopeError> for FanoutError {
    fn from(e: ScopeError) -> Self {
        FanoutError::Validation(e.to_string())
    }
}

pub type FanoutResult<T> = Result<T, FanoutError>;
