mod http;

pub use http::HttpGateway;

use crate::{
    error::ProcessError,
    models::{Resource, ResourceKind},
};
use axum::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("resource not found")]
    NotFound,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Error seen by the caller when fetching `id` failed.
    pub fn on_fetch(self, kind: ResourceKind, id: &str) -> ProcessError {
        match self {
            Self::NotFound => ProcessError::NotFound {
                kind,
                id: id.to_string(),
            },
            other => other.on_replace(kind),
        }
    }

    /// Error seen by the caller when pushing a replacement failed. A missing
    /// resource at this point is an upstream problem, not a bad request.
    pub fn on_replace(self, kind: ResourceKind) -> ProcessError {
        ProcessError::Gateway {
            kind,
            message: self.to_string(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Remote owner of one kind of resource.
///
/// Implementations do not retry; a failed call is reported as is.
#[async_trait]
pub trait Gateway<R: Resource>: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<R, GatewayError>;

    /// Pushes a full replacement and returns what the owner stored.
    async fn replace(&self, resource: &R) -> Result<R, GatewayError>;
}
