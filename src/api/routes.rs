mod circuits;
mod history;
mod transaction;

pub use circuits::{reset as reset_circuit, show as show_circuits};
pub use history::{list as list_transactions, list_in_range};
pub use transaction::process as process_transaction;

use crate::{error::ProcessError, telemetry};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

impl From<&ProcessError> for StatusCode {
    fn from(err: &ProcessError) -> Self {
        match err {
            ProcessError::Validation(_)
            | ProcessError::InactiveResource { .. }
            | ProcessError::InsufficientFunds { .. }
            | ProcessError::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
            ProcessError::NotFound { .. } => StatusCode::NOT_FOUND,
            ProcessError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            ProcessError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProcessError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(test, derive(Debug, serde::Deserialize, PartialEq))]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&ProcessError> for ErrorBody {
    fn from(err: &ProcessError) -> Self {
        // Collaborator failures carry upstream detail that stays in the logs.
        let message = match err {
            ProcessError::Gateway { kind, .. } => format!("{} service call failed", kind),
            ProcessError::Ledger(_) => "transaction could not be recorded".to_string(),
            other => other.to_string(),
        };

        Self {
            code: err.code().to_string(),
            message,
        }
    }
}

impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);

        if status.is_server_error() {
            telemetry::error!("Transaction failed: {}", self);
        } else {
            telemetry::debug!("Transaction rejected: {}", self);
        }

        (status, Json(ErrorBody::from(&self))).into_response()
    }
}
