//! Executes a transaction against the resource services and records it.
//!
//! Every transaction type runs the same pipeline over a short plan of legs.
//! A leg fetches one resource, checks it is active, moves its monetary field
//! in one direction and pushes the full snapshot back. Once every leg has been
//! applied the ledger gets a record and the event bus a notification.
//!
//! Legs are applied one after the other with nothing spanning them. When a
//! later leg fails the earlier ones stay applied unless compensation is
//! enabled. Without resource locks two pipelines over the same resource can
//! read the same value and the last write wins.

mod locks;

pub use locks::ResourceLocks;

use crate::{
    error::ProcessError,
    gateway::Gateway,
    models::{
        Account, Credit, CreditCard, Resource, ResourceKind, Status, TransactionRecord,
        TransactionRequest, TransactionType,
    },
    notifier::Notifier,
    persistence::Ledger,
    telemetry,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

pub struct Gateways {
    pub accounts: Arc<dyn Gateway<Account>>,
    pub credits: Arc<dyn Gateway<Credit>>,
    pub credit_cards: Arc<dyn Gateway<CreditCard>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    fn reversed(self) -> Self {
        match self {
            Self::Increase => Self::Decrease,
            Self::Decrease => Self::Increase,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Leg<'a> {
    kind: ResourceKind,
    id: &'a str,
    direction: Direction,
}

impl<'a> Leg<'a> {
    fn new(kind: ResourceKind, id: &'a str, direction: Direction) -> Self {
        Self {
            kind,
            id,
            direction,
        }
    }
}

fn plan(kind: TransactionType, request: &TransactionRequest) -> Result<Vec<Leg<'_>>, ProcessError> {
    use Direction::*;

    Ok(match kind {
        TransactionType::Deposit => vec![Leg::new(
            ResourceKind::Account,
            request.destination_account()?,
            Increase,
        )],
        TransactionType::Withdrawal => vec![Leg::new(
            ResourceKind::Account,
            request.origin_account()?,
            Decrease,
        )],
        TransactionType::Transfer => vec![
            Leg::new(ResourceKind::Account, request.origin_account()?, Decrease),
            Leg::new(ResourceKind::Account, request.destination_account()?, Increase),
        ],
        TransactionType::CreditPayment => {
            vec![Leg::new(ResourceKind::Credit, request.credit()?, Decrease)]
        }
        TransactionType::CreditCardPayment => vec![Leg::new(
            ResourceKind::CreditCard,
            request.credit_card()?,
            Decrease,
        )],
    })
}

/// Monetary value of a resource after its leg was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceValue {
    pub kind: ResourceKind,
    pub id: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub record: TransactionRecord,
    pub resources: Vec<ResourceValue>,
}

pub struct Dispatcher {
    gateways: Gateways,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    compensate: bool,
    locks: Option<ResourceLocks>,
}

impl Dispatcher {
    pub fn new(gateways: Gateways, ledger: Arc<dyn Ledger>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            gateways,
            ledger,
            notifier,
            compensate: false,
            locks: None,
        }
    }

    /// Undo applied legs when a later leg of the same transaction fails.
    pub fn with_compensation(mut self, enabled: bool) -> Self {
        self.compensate = enabled;
        self
    }

    /// Serialize pipelines touching the same resource. Zero shards disables it.
    pub fn with_resource_locks(mut self, shards: usize) -> Self {
        self.locks = (shards > 0).then(|| ResourceLocks::new(shards));
        self
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub async fn process(&self, request: TransactionRequest) -> Result<Processed, ProcessError> {
        let kind = request.kind()?;
        request.check_shape(kind)?;
        let legs = plan(kind, &request)?;

        let _guards = match &self.locks {
            Some(locks) => {
                let keys: Vec<_> = legs.iter().map(|leg| (leg.kind, leg.id)).collect();
                locks.acquire(&keys).await
            }
            None => Vec::new(),
        };

        let mut resources = Vec::with_capacity(legs.len());
        for (applied, leg) in legs.iter().enumerate() {
            match self.apply(leg, request.amount).await {
                Ok(value) => resources.push(value),
                Err(err) => {
                    if applied > 0 {
                        telemetry::error!(
                            "{} failed after {} leg(s) were applied: {}",
                            kind,
                            applied,
                            err
                        );

                        if self.compensate {
                            self.undo(&legs[..applied], request.amount).await;
                        }
                    }

                    return Err(err);
                }
            }
        }

        let record = self
            .ledger
            .append(TransactionRecord::new(kind, &request))
            .await
            .map_err(|err| {
                telemetry::error!("{} applied but not recorded: {}", kind, err);
                ProcessError::from(err)
            })?;

        telemetry::debug!("{} recorded with id {:?}", kind, record.id);

        self.notify(&record);

        Ok(Processed { record, resources })
    }

    async fn apply(&self, leg: &Leg<'_>, amount: Decimal) -> Result<ResourceValue, ProcessError> {
        let value = match leg.kind {
            ResourceKind::Account => {
                mutate(self.gateways.accounts.as_ref(), leg.id, leg.direction, amount).await?
            }
            ResourceKind::Credit => {
                mutate(self.gateways.credits.as_ref(), leg.id, leg.direction, amount).await?
            }
            ResourceKind::CreditCard => {
                mutate(self.gateways.credit_cards.as_ref(), leg.id, leg.direction, amount).await?
            }
        };

        Ok(ResourceValue {
            kind: leg.kind,
            id: leg.id.to_string(),
            value,
        })
    }

    async fn undo(&self, applied: &[Leg<'_>], amount: Decimal) {
        for leg in applied.iter().rev() {
            let reversal = Leg {
                direction: leg.direction.reversed(),
                ..*leg
            };

            #[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
            match self.apply(&reversal, amount).await {
                Ok(_) => {
                    telemetry::info!("compensated {} {}", leg.kind, leg.id);
                }
                Err(err) => {
                    telemetry::error!("compensation of {} {} failed: {}", leg.kind, leg.id, err);
                }
            }
        }
    }

    fn notify(&self, record: &TransactionRecord) {
        let notifier = Arc::clone(&self.notifier);
        let message = record.describe();

        tokio::spawn(async move {
            #[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
            if let Err(err) = notifier.publish(message).await {
                telemetry::error!("failed to publish transaction event: {}", err);
            }
        });
    }
}

async fn mutate<R: Resource>(
    gateway: &dyn Gateway<R>,
    id: &str,
    direction: Direction,
    amount: Decimal,
) -> Result<Decimal, ProcessError> {
    let mut snapshot = gateway
        .fetch(id)
        .await
        .map_err(|e| e.on_fetch(R::KIND, id))?;

    if snapshot.status() != Status::Active {
        return Err(ProcessError::InactiveResource {
            kind: R::KIND,
            id: id.to_string(),
        });
    }

    let current = snapshot.value();
    let next = match direction {
        Direction::Increase => current.checked_add(amount).ok_or_else(|| {
            ProcessError::Validation(format!("amount overflows {} {}", R::KIND, id))
        })?,
        Direction::Decrease if current < amount => {
            return Err(ProcessError::InsufficientFunds {
                kind: R::KIND,
                id: id.to_string(),
            })
        }
        Direction::Decrease => current - amount,
    };

    snapshot.set_value(next);

    let stored = gateway
        .replace(&snapshot)
        .await
        .map_err(|e| e.on_replace(R::KIND))?;

    Ok(stored.value())
}
