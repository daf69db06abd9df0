use crate::{models::ResourceKind, persistence};
use thiserror::Error;

/// Every way a transaction can fail, from request validation to an open
/// circuit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{kind} {id} is not active")]
    InactiveResource { kind: ResourceKind, id: String },

    #[error("insufficient funds in {kind} {id}")]
    InsufficientFunds { kind: ResourceKind, id: String },

    #[error("{kind} service call failed: {message}")]
    Gateway { kind: ResourceKind, message: String },

    #[error("ledger write failed: {0}")]
    Ledger(String),

    #[error("service unavailable, circuit {0} is open")]
    ServiceUnavailable(String),

    #[error("unsupported transaction type: {0}")]
    UnsupportedOperation(String),
}

impl ProcessError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InactiveResource { .. } => "INACTIVE_RESOURCE",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Gateway { .. } => "GATEWAY_ERROR",
            Self::Ledger(_) => "LEDGER_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
        }
    }

    /// Failures of a collaborator rather than of the request. Only these count
    /// against a circuit.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, Self::Gateway { .. } | Self::Ledger(_))
    }
}

impl From<persistence::Error> for ProcessError {
    fn from(err: persistence::Error) -> Self {
        Self::Ledger(err.to_string())
    }
}
