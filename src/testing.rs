//! Test doubles shared by the unit tests.

use crate::{
    gateway::{Gateway, GatewayError},
    models::{Account, Credit, CreditCard, LedgerQuery, Resource, Status, TransactionRecord},
    notifier::{self, Notifier},
    persistence::{self, Ledger},
};
use axum::{async_trait, Router};
use rust_decimal::Decimal;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};
use tokio::sync::mpsc;

/// Serves `router` on an ephemeral local port and returns its base url.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

    format!("http://{}", addr)
}

pub fn account(id: &str, status: Status, balance: Decimal) -> Account {
    Account {
        id: id.into(),
        status,
        balance,
        extra: Default::default(),
    }
}

pub fn credit(id: &str, status: Status, debt: Decimal) -> Credit {
    Credit {
        id: id.into(),
        status,
        debt,
        extra: Default::default(),
    }
}

pub fn credit_card(id: &str, status: Status, balance: Decimal) -> CreditCard {
    CreditCard {
        id: id.into(),
        status,
        balance,
        extra: Default::default(),
    }
}

/// Resource service held in memory, with injectable failures.
pub struct MemoryGateway<R> {
    resources: Mutex<HashMap<String, R>>,
    failing_fetches: Mutex<HashSet<String>>,
    failing_replaces: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl<R: Resource> MemoryGateway<R> {
    pub fn new(resources: impl IntoIterator<Item = R>) -> Self {
        Self {
            resources: Mutex::new(
                resources
                    .into_iter()
                    .map(|r| (r.id().to_string(), r))
                    .collect(),
            ),
            failing_fetches: Default::default(),
            failing_replaces: Default::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.resources.lock().unwrap().get(id).cloned()
    }

    pub fn value(&self, id: &str) -> Decimal {
        self.get(id).unwrap().value()
    }

    pub fn fail_fetch(&self, id: &str) {
        self.failing_fetches.lock().unwrap().insert(id.into());
    }

    pub fn fail_replace(&self, id: &str) {
        self.failing_replaces.lock().unwrap().insert(id.into());
    }

    /// Number of fetch and replace calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Resource> Gateway<R> for MemoryGateway<R> {
    async fn fetch(&self, id: &str) -> Result<R, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_fetches.lock().unwrap().contains(id) {
            return Err(GatewayError::Transport("connection reset".into()));
        }

        let found = self.get(id).ok_or(GatewayError::NotFound);
        // Give concurrent pipelines a chance to interleave.
        tokio::task::yield_now().await;
        found
    }

    async fn replace(&self, resource: &R) -> Result<R, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_replaces.lock().unwrap().contains(resource.id()) {
            return Err(GatewayError::Remote {
                status: 500,
                message: "write failed".into(),
            });
        }

        self.resources
            .lock()
            .unwrap()
            .insert(resource.id().to_string(), resource.clone());

        Ok(resource.clone())
    }
}

/// Forwards every published line to a channel.
pub struct RecordingNotifier {
    sender: mpsc::UnboundedSender<String>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, message: String) -> Result<(), notifier::Error> {
        self.sender.send(message).ok();
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn publish(&self, _message: String) -> Result<(), notifier::Error> {
        Err(notifier::Error::Rejected(503))
    }
}

pub struct FailingLedger;

#[async_trait]
impl Ledger for FailingLedger {
    async fn append(
        &self,
        _record: TransactionRecord,
    ) -> Result<TransactionRecord, persistence::Error> {
        Err(persistence::Error::Connection)
    }

    async fn find(
        &self,
        _query: &LedgerQuery,
    ) -> Result<Vec<TransactionRecord>, persistence::Error> {
        Err(persistence::Error::Connection)
    }
}
