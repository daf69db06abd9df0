use std::sync::Arc;

use crate::{
    error::ProcessError,
    models::{LedgerQuery, TransactionRecord},
    service::TransactionService,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

fn query_for(filter: &str, value: String) -> Result<LedgerQuery, ProcessError> {
    Ok(match filter {
        "origin" => LedgerQuery::ByOriginAccount(value),
        "destination" => LedgerQuery::ByDestinationAccount(value),
        "account" => LedgerQuery::ByAccount(value),
        "credit" => LedgerQuery::ByCredit(value),
        "credit-card" => LedgerQuery::ByCreditCard(value),
        "debit-card" => LedgerQuery::ByDebitCard(value),
        "type" => LedgerQuery::ByType(value.parse()?),
        other => {
            return Err(ProcessError::Validation(format!(
                "unknown transaction filter: {}",
                other
            )))
        }
    })
}

pub async fn list(
    State(service): State<Arc<dyn TransactionService>>,
    Path((filter, value)): Path<(String, String)>,
) -> Result<Json<Vec<TransactionRecord>>, ProcessError> {
    let query = query_for(&filter, value)?;

    Ok(Json(service.history(query).await?))
}

#[derive(Deserialize)]
pub struct Range {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

pub async fn list_in_range(
    State(service): State<Arc<dyn TransactionService>>,
    Query(Range { from, to }): Query<Range>,
) -> Result<Json<Vec<TransactionRecord>>, ProcessError> {
    if from > to {
        return Err(ProcessError::Validation("from must not be after to".into()));
    }

    Ok(Json(service.history(LedgerQuery::ByDateRange { from, to }).await?))
}
