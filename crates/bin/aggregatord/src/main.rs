//! # aggregatord — sensor aggregation daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (`aggregator.toml`, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository, sensor source and sink implementations (adapters)
//! - Construct the collector, action engine and scheduler, injecting adapters
//!   via port traits
//! - Seed endpoints and rules from configuration
//! - Serve the management API and drive both periodic loops
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use aggregator_adapter_http_axum::state::AppState;
use aggregator_adapter_http_sensor::HttpSensorSource;
use aggregator_adapter_sinks::SinkDispatcher;
use aggregator_adapter_storage_sqlite_sqlx::{
    SqliteDataPointStore, SqliteEndpointRepository, SqliteFiringStore, SqliteRuleRepository,
};
use aggregator_app::action_engine::ActionEngine;
use aggregator_app::collector::Collector;
use aggregator_app::evaluator::StoreEvaluator;
use aggregator_app::ports::{DataPointStore, EndpointRepository, RuleRepository, SensorSource};
use aggregator_app::scheduler::Scheduler;
use aggregator_app::services::{EndpointRegistry, RuleService};
use aggregator_domain::error::{AggregatorError, ConfigurationError};
use aggregator_domain::time;
use aggregator_domain::unit::UnitNormalizer;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = config.database.clone().build().await?;
    let pool = db.pool().clone();
    let store = Arc::new(SqliteDataPointStore::new(pool.clone()));

    // Services
    let endpoints = Arc::new(EndpointRegistry::new(SqliteEndpointRepository::new(
        pool.clone(),
    )));
    let rules = Arc::new(RuleService::new(SqliteRuleRepository::new(pool.clone())));
    seed(&config, &endpoints, &rules).await?;

    // Collection and actions
    let collector = Arc::new(Collector::new(
        SqliteEndpointRepository::new(pool.clone()),
        HttpSensorSource::new(&config.sensor)?,
        Arc::clone(&store),
        UnitNormalizer::default(),
        config.collector_config(),
    ));
    if config.collector.backfill_on_start {
        backfill(&collector, &endpoints).await?;
    }
    let engine = ActionEngine::new(
        SqliteRuleRepository::new(pool.clone()),
        StoreEvaluator::new(Arc::clone(&store)),
        SqliteFiringStore::new(pool),
        SinkDispatcher::new(&config.sinks)?,
        config.action_engine_config(),
    );
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&collector),
        engine,
        config.scheduler_config(),
    ));

    // Shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = wait_for_shutdown().await {
            tracing::error!(error = %err, "failed to install signal handlers");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutdown requested");
        shutdown_tx.send_replace(true);
    });

    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    // HTTP
    let state = AppState::new(endpoints, rules, store, scheduler.health());
    let app = aggregator_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "aggregatord listening");

    let mut http_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = http_shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    scheduler_task.await?;
    db.close().await;
    tracing::info!("aggregatord stopped");

    Ok(())
}

/// Register configured endpoints and upsert configured rules.
///
/// Endpoints whose URL is already registered are left untouched, so
/// restarting with the same file is a no-op.
async fn seed<ER, RR>(
    config: &Config,
    endpoints: &EndpointRegistry<ER>,
    rules: &RuleService<RR>,
) -> Result<(), Box<dyn std::error::Error>>
where
    ER: EndpointRepository + Sync,
    RR: RuleRepository + Sync,
{
    for seed in &config.endpoints {
        let endpoint = seed.to_endpoint(config.collector.default_timeout)?;
        match endpoints.register(endpoint).await {
            Ok(_) => {}
            Err(AggregatorError::Configuration(ConfigurationError::DuplicateEndpoint { url })) => {
                tracing::debug!(%url, "endpoint already registered");
            }
            Err(err) => return Err(err.into()),
        }
    }
    for seed in &config.rules {
        rules.upsert_by_name(seed.to_rule()?).await?;
    }
    tracing::info!(
        endpoints = config.endpoints.len(),
        rules = config.rules.len(),
        "configuration seeded"
    );
    Ok(())
}

/// Catch up on readings taken while the daemon was down.
async fn backfill<R, ER, S, DS>(
    collector: &Collector<ER, S, DS>,
    endpoints: &EndpointRegistry<R>,
) -> Result<(), AggregatorError>
where
    R: EndpointRepository + Sync,
    ER: EndpointRepository + Sync,
    S: SensorSource,
    DS: DataPointStore + Sync,
{
    for endpoint in endpoints.list(true).await? {
        let outcome = collector.backfill(endpoint.id, time::now()).await?;
        if let Err(failure) = outcome.result {
            tracing::warn!(endpoint_id = %endpoint.id, error = %failure, "backfill skipped");
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
