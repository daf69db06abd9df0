//! Publication of processed transactions to the event bus.
//!
//! Delivery is best effort. Callers log a failed publish and move on.

use crate::telemetry;
use axum::async_trait;
use reqwest::{header::CONTENT_TYPE, Url};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const KAFKA_JSON: &str = "application/vnd.kafka.json.v2+json";

#[derive(Debug, Error)]
pub enum Error {
    #[error("event bus unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("event bus rejected message with status {0}")]
    Rejected(u16),
    #[error("invalid event bus url: {0}")]
    Url(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, message: String) -> Result<(), Error>;
}

/// Produces to one topic through a Kafka compatible HTTP proxy.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpNotifier {
    pub fn new(base_url: &str, topic: &str, timeout: Duration) -> Result<Self, Error> {
        let mut endpoint = Url::parse(base_url).map_err(|e| Error::Url(e.to_string()))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| Error::Url(base_url.to_string()))?
            .pop_if_empty()
            .extend(["topics", topic]);

        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn publish(&self, message: String) -> Result<(), Error> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, KAFKA_JSON)
            .body(json!({ "records": [{ "value": message }] }).to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Rejected(response.status().as_u16()));
        }

        Ok(())
    }
}

/// Used when no event bus is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    #[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
    async fn publish(&self, message: String) -> Result<(), Error> {
        telemetry::info!("transaction event: {}", message);

        Ok(())
    }
}
