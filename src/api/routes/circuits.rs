use std::sync::Arc;

use super::ErrorBody;
use crate::{resilience::CircuitStatus, service::TransactionService, telemetry};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

pub async fn show(State(service): State<Arc<dyn TransactionService>>) -> Json<Vec<CircuitStatus>> {
    Json(service.circuits())
}

pub async fn reset(
    State(service): State<Arc<dyn TransactionService>>,
    Path(name): Path<String>,
) -> Response {
    if service.reset_circuit(&name) {
        return StatusCode::NO_CONTENT.into_response();
    }

    telemetry::debug!("No circuit named {}", name);

    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            code: "NOT_FOUND".into(),
            message: format!("circuit {} not found", name),
        }),
    )
        .into_response()
}
