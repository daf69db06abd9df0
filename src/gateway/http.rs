use super::{Gateway, GatewayError};
use crate::{models::Resource, telemetry};
use axum::async_trait;
use reqwest::{StatusCode, Url};
use std::{marker::PhantomData, time::Duration};

const MAX_REMOTE_MESSAGE: usize = 120;

/// JSON over HTTP client for a resource service.
///
/// `GET {base}/{id}` reads a resource, `POST {base}` with the full body
/// replaces it.
pub struct HttpGateway<R> {
    client: reqwest::Client,
    base_url: Url,
    resource: PhantomData<fn() -> R>,
}

impl<R: Resource> HttpGateway<R> {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid base url {}: {}", base_url, e)))?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            resource: PhantomData,
        })
    }

    fn resource_url(&self, id: &str) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Transport(format!("{} cannot be a base url", self.base_url))
            })?
            .pop_if_empty()
            .push(id);

        Ok(url)
    }

    async fn remote_error(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let mut message = response.text().await.unwrap_or_default();

        telemetry::error!("{} service answered {}: {}", R::KIND, status, message);

        if let Some((cut, _)) = message.char_indices().nth(MAX_REMOTE_MESSAGE) {
            message.truncate(cut);
        }

        GatewayError::Remote { status, message }
    }
}

#[async_trait]
impl<R: Resource> Gateway<R> for HttpGateway<R> {
    async fn fetch(&self, id: &str) -> Result<R, GatewayError> {
        let response = self.client.get(self.resource_url(id)?).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
            status if status.is_success() => {
                let body = response.bytes().await?;

                // Some services answer 200 with no body for a missing id.
                match body.trim_ascii() {
                    b"" | b"null" => Err(GatewayError::NotFound),
                    json => serde_json::from_slice(json)
                        .map_err(|e| GatewayError::Decode(e.to_string())),
                }
            }
            _ => Err(Self::remote_error(response).await),
        }
    }

    async fn replace(&self, resource: &R) -> Result<R, GatewayError> {
        let response = self
            .client
            .post(self.base_url.clone())
            .json(resource)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::remote_error(response).await);
        }

        Ok(response.json().await?)
    }
}
