mod circuit_breaker;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitMetrics, Outcome, State,
};

use crate::{
    dispatcher::{Dispatcher, Processed},
    error::ProcessError,
    models::{TransactionRequest, TransactionType},
};
use serde::Serialize;
use std::{collections::HashMap, str::FromStr};

const SHARED_CIRCUIT: &str = "transactions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitScope {
    /// One circuit in front of the whole dispatcher.
    Shared,
    /// One circuit per transaction type.
    PerType,
}

impl FromStr for CircuitScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared" => Ok(Self::Shared),
            "per-type" | "per_type" => Ok(Self::PerType),
            other => Err(format!("unknown circuit scope: {}", other)),
        }
    }
}

enum Circuits {
    Shared(CircuitBreaker),
    PerType(HashMap<TransactionType, CircuitBreaker>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStatus {
    pub name: String,
    pub state: State,
    #[serde(flatten)]
    pub metrics: CircuitMetrics,
}

fn outcome(err: &ProcessError) -> Outcome {
    if err.is_upstream_failure() {
        Outcome::Failure
    } else {
        Outcome::Ignored
    }
}

/// The dispatcher behind circuit breakers. Only collaborator failures trip a
/// circuit; a rejected request leaves it untouched.
pub struct ResilientDispatcher {
    dispatcher: Dispatcher,
    circuits: Circuits,
}

impl ResilientDispatcher {
    pub fn new(dispatcher: Dispatcher, scope: CircuitScope, config: CircuitBreakerConfig) -> Self {
        let circuits = match scope {
            CircuitScope::Shared => {
                Circuits::Shared(CircuitBreaker::new(SHARED_CIRCUIT, config))
            }
            CircuitScope::PerType => Circuits::PerType(
                TransactionType::ALL
                    .into_iter()
                    .map(|kind| {
                        let name = format!(
                            "{}.{}",
                            SHARED_CIRCUIT,
                            kind.as_str().to_ascii_lowercase()
                        );
                        (kind, CircuitBreaker::new(name, config.clone()))
                    })
                    .collect(),
            ),
        };

        Self {
            dispatcher,
            circuits,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn circuit_for(&self, request: &TransactionRequest) -> Option<&CircuitBreaker> {
        match &self.circuits {
            Circuits::Shared(breaker) => Some(breaker),
            Circuits::PerType(breakers) => {
                request.kind().ok().and_then(|kind| breakers.get(&kind))
            }
        }
    }

    pub async fn process(&self, request: TransactionRequest) -> Result<Processed, ProcessError> {
        // An unknown type has no circuit of its own and fails without side
        // effects anyway.
        let Some(breaker) = self.circuit_for(&request) else {
            return self.dispatcher.process(request).await;
        };

        breaker
            .call(|| self.dispatcher.process(request), outcome)
            .await
            .map_err(|err| match err {
                CircuitBreakerError::Open => {
                    ProcessError::ServiceUnavailable(breaker.name().to_string())
                }
                CircuitBreakerError::Inner(err) => err,
            })
    }

    /// Forces the named circuit back to CLOSED. False when no circuit has
    /// that name.
    pub fn reset(&self, name: &str) -> bool {
        let breaker = match &self.circuits {
            Circuits::Shared(breaker) => Some(breaker).filter(|b| b.name() == name),
            Circuits::PerType(breakers) => breakers.values().find(|b| b.name() == name),
        };

        breaker.map(CircuitBreaker::reset).is_some()
    }

    pub fn circuits(&self) -> Vec<CircuitStatus> {
        let status = |breaker: &CircuitBreaker| CircuitStatus {
            name: breaker.name().to_string(),
            state: breaker.state(),
            metrics: breaker.metrics(),
        };

        let mut statuses: Vec<_> = match &self.circuits {
            Circuits::Shared(breaker) => vec![status(breaker)],
            Circuits::PerType(breakers) => breakers.values().map(status).collect(),
        };
        statuses.sort_by(|a, b| a.name.cmp(&b.name));

        statuses
    }
}
