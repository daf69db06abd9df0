use std::sync::Arc;

use crate::{
    dispatcher::{Processed, ResourceValue},
    error::ProcessError,
    models::{TransactionRecord, TransactionRequest},
    service::TransactionService,
    telemetry,
};
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request as AxumRequest, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
pub struct Response {
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub resources: Vec<ResourceValue>,
}

impl From<Processed> for Response {
    fn from(processed: Processed) -> Self {
        Self {
            record: processed.record,
            resources: processed.resources,
        }
    }
}

pub async fn process(
    State(service): State<Arc<dyn TransactionService>>,
    ValidateProcess(payload): ValidateProcess<TransactionRequest>,
) -> Result<Json<Response>, ProcessError> {
    Ok(Json(service.process(payload).await?.into()))
}

pub struct ValidateProcess<Request>(pub Request);

#[async_trait]
impl<S> FromRequest<S> for ValidateProcess<TransactionRequest>
where
    S: Send + Sync,
    Json<TransactionRequest>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ProcessError;

    async fn from_request(req: AxumRequest, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<TransactionRequest>::from_request(req, state)
            .await
            .map_err(|e| {
                telemetry::debug!("Failed to deserialize request JSON: {}", e);

                ProcessError::Validation(e.body_text())
            })?;

        data.validate(Utc::now())?;

        Ok(Self(data))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        api::routes::mock::{self, MockService, TestScenario},
        models::ResourceKind,
    };
    use axum::{body::Body, http::StatusCode};
    use chrono::Duration;
    use http_body_util::BodyExt;
    use rstest::rstest;
    use serde_json::json;
    use tower::util::ServiceExt;

    fn tomorrow() -> String {
        (Utc::now() + Duration::days(1)).to_rfc3339()
    }

    async fn post(
        scenario: TestScenario,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let app = crate::api::app::new(Arc::new(MockService::new(scenario)));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method(axum::http::Method::POST)
                    .uri("/transactions/process")
                    .header(axum::http::header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_serialization() {
        let response = Response::from(Processed {
            record: mock::record(),
            resources: vec![ResourceValue {
                kind: ResourceKind::CreditCard,
                id: "CC1".into(),
                value: rust_decimal_macros::dec!(45.50),
            }],
        });

        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({
                "id": 1,
                "transactionType": "DEPOSIT",
                "originAccountId": null,
                "destinationAccountId": "A1",
                "creditId": null,
                "creditCardId": null,
                "debitCardId": null,
                "amount": "200.00",
                "commission": "0",
                "transactionDate": "2030-01-01T00:00:00Z",
                "resources": [
                    { "kind": "CREDIT_CARD", "id": "CC1", "value": "45.50" }
                ],
            })
        );
    }

    #[rstest]
    #[case::zero_amount(
        json!({ "transactionType": "DEPOSIT", "destinationAccountId": "A1", "amount": 0 }),
        "VALIDATION_ERROR",
    )]
    #[case::negative_amount(
        json!({ "transactionType": "DEPOSIT", "destinationAccountId": "A1", "amount": -5 }),
        "VALIDATION_ERROR",
    )]
    #[case::missing_destination(
        json!({ "transactionType": "DEPOSIT", "amount": 10 }),
        "VALIDATION_ERROR",
    )]
    #[case::same_account_transfer(
        json!({
            "transactionType": "TRANSFER",
            "originAccountId": "A1",
            "destinationAccountId": "A1",
            "amount": 10,
        }),
        "VALIDATION_ERROR",
    )]
    #[case::sub_cent_amount(
        json!({ "transactionType": "WITHDRAWAL", "originAccountId": "A1", "amount": "0.001" }),
        "VALIDATION_ERROR",
    )]
    #[case::unknown_type(
        json!({ "transactionType": "REFUND", "originAccountId": "A1", "amount": 10 }),
        "UNSUPPORTED_OPERATION",
    )]
    #[tokio::test]
    async fn test_validation(#[case] mut request_json: serde_json::Value, #[case] code: &str) {
        request_json["transactionDate"] = json!(tomorrow());

        let (status, body) = post(TestScenario::Success, request_json).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], code);
    }

    #[tokio::test]
    async fn test_past_date_is_rejected() {
        let (status, body) = post(
            TestScenario::Success,
            json!({
                "transactionType": "DEPOSIT",
                "destinationAccountId": "A1",
                "amount": 10,
                "transactionDate": "2020-01-01T00:00:00Z",
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (status, body) = post(
            TestScenario::Success,
            json!({ "transactionType": "DEPOSIT", "amount": "lots" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[rstest]
    #[case::not_found(
        TestScenario::Failure(ProcessError::NotFound {
            kind: ResourceKind::Account,
            id: "A1".into(),
        }),
        StatusCode::NOT_FOUND,
    )]
    #[case::insufficient_funds(
        TestScenario::Failure(ProcessError::InsufficientFunds {
            kind: ResourceKind::Account,
            id: "A1".into(),
        }),
        StatusCode::BAD_REQUEST,
    )]
    #[case::gateway(
        TestScenario::Failure(ProcessError::Gateway {
            kind: ResourceKind::Account,
            message: "connection refused".into(),
        }),
        StatusCode::BAD_GATEWAY,
    )]
    #[case::ledger(
        TestScenario::Failure(ProcessError::Ledger("ledger connection unavailable".into())),
        StatusCode::INTERNAL_SERVER_ERROR,
    )]
    #[case::circuit_open(
        TestScenario::Failure(ProcessError::ServiceUnavailable("transactions".into())),
        StatusCode::SERVICE_UNAVAILABLE,
    )]
    #[case::success(TestScenario::Success, StatusCode::OK)]
    #[tokio::test]
    async fn test_process(#[case] scenario: TestScenario, #[case] expected_status: StatusCode) {
        let (status, body) = post(
            scenario.clone(),
            json!({
                "type": "deposit",
                "destinationAccountId": "A1",
                "amount": "200.00",
                "transactionDate": tomorrow(),
            }),
        )
        .await;

        assert_eq!(status, expected_status);

        match scenario {
            TestScenario::Success => {
                assert_eq!(body["id"], 1);
                assert_eq!(body["resources"][0]["value"], "1200.00");
            }
            TestScenario::Failure(err) => assert_eq!(body["code"], err.code()),
        }
    }
}
