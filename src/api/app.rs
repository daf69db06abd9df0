use super::routes;
use crate::service::TransactionService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn new(service: Arc<dyn TransactionService>) -> Router {
    Router::new()
        .route("/transactions/process", post(routes::process_transaction))
        .route("/transactions/range", get(routes::list_in_range))
        .route("/transactions/:filter/:value", get(routes::list_transactions))
        .route("/circuits", get(routes::show_circuits))
        .route("/circuits/:name/reset", post(routes::reset_circuit))
        .with_state(service)
}
