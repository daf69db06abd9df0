use std::sync::Arc;

mod api;
mod config;
mod dispatcher;
mod error;
mod gateway;
mod models;
mod notifier;
mod persistence;
mod resilience;
mod service;
mod telemetry;
#[cfg(test)]
mod testing;

use config::{Config, LedgerBackend};
use dispatcher::{Dispatcher, Gateways};
use gateway::HttpGateway;
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server,
};
use notifier::{HttpNotifier, LogNotifier, Notifier};
use persistence::Ledger;
use resilience::ResilientDispatcher;
use tower::Service;

#[cfg(feature = "telemetry")]
use {
    axum::{body::Body, http},
    tower_http::trace::TraceLayer,
    tower_request_id::{RequestId, RequestIdLayer},
    tracing::error_span,
    tracing_subscriber::{
        layer::{Layer, SubscriberExt},
        util::SubscriberInitExt,
    },
};

#[tokio::main]
async fn main() {
    #[cfg(feature = "telemetry")]
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
                .pretty()
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
        )
        .init();

    let config = Config::from_env().unwrap_or_else(|e| panic!("invalid configuration: {}", e));

    let ledger: Arc<dyn Ledger> = match &config.ledger {
        LedgerBackend::Postgres { url, pool_size } => Arc::new(
            persistence::database::PostgresLedger::new(url, *pool_size)
                .await
                .unwrap_or_else(|e| panic!("failed to connect to ledger database: {}", e)),
        ),
        LedgerBackend::Memory => Arc::new(persistence::memory::MemoryLedger::new()),
    };

    let gateways = Gateways {
        accounts: Arc::new(
            HttpGateway::new(&config.account_service_url, config.gateway_timeout)
                .unwrap_or_else(|e| panic!("failed to build account gateway: {}", e)),
        ),
        credits: Arc::new(
            HttpGateway::new(&config.credit_service_url, config.gateway_timeout)
                .unwrap_or_else(|e| panic!("failed to build credit gateway: {}", e)),
        ),
        credit_cards: Arc::new(
            HttpGateway::new(&config.credit_card_service_url, config.gateway_timeout)
                .unwrap_or_else(|e| panic!("failed to build credit card gateway: {}", e)),
        ),
    };

    let notifier: Arc<dyn Notifier> = match &config.event_bus {
        Some(bus) => Arc::new(
            HttpNotifier::new(&bus.url, &bus.topic, config.gateway_timeout)
                .unwrap_or_else(|e| panic!("failed to build event bus client: {}", e)),
        ),
        None => Arc::new(LogNotifier),
    };

    let dispatcher = Dispatcher::new(gateways, ledger, notifier)
        .with_compensation(config.compensate_transfers)
        .with_resource_locks(config.resource_lock_shards);

    let service = ResilientDispatcher::new(
        dispatcher,
        config.circuit_scope,
        config.circuit_breaker.clone(),
    );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .unwrap_or_else(|_| panic!("failed to bind listener to port: {}", config.port));

    telemetry::debug!(
        "Listening on {}",
        listener.local_addr().expect("failed to get local addr")
    );

    let app = api::app::new(Arc::new(service));

    #[cfg(feature = "telemetry")]
    let app = app
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &http::Request<Body>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown".into());

                error_span!(
                    "request",
                    id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(RequestIdLayer);

    // Continuously accept new connections.
    loop {
        let (socket, _remote_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            #[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
            Err(err) => {
                telemetry::error!("failed to accept connection: {}", err);
                continue;
            }
        };
        let tower_service = app.clone();

        tokio::spawn(async move {
            let socket = TokioIo::new(socket);

            let hyper_service =
                hyper::service::service_fn(move |request: axum::extract::Request<Incoming>| {
                    tower_service.clone().call(request)
                });

            #[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
            if let Err(err) = server::conn::auto::Builder::new(TokioExecutor::new())
                .http2()
                .keep_alive_timeout(std::time::Duration::from_secs(120))
                .keep_alive_interval(std::time::Duration::from_secs(30))
                .timer(TokioTimer::new())
                .serve_connection(socket, hyper_service)
                .await
            {
                telemetry::error!("failed to serve connection: {}", err);
            }
        });
    }
}
