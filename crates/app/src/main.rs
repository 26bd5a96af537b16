use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::runtime::Handle;
use tracing::{info, warn};

use stockledger_catalog::{EntityStore, InMemoryCatalog};
use stockledger_events::{EventEnvelope, InMemoryEventBus};
use stockledger_infra::projections::StockLevelsProjection;
use stockledger_infra::schema::ensure_schema;
use stockledger_infra::workers::{activity_handler, stock_cache_handler, ProjectionWorker};
use stockledger_infra::{
    ActivityRecorder, AppConfig, InMemoryLedger, InMemoryStockStore, MutationLedger, PostgresCatalog, PostgresLedger,
    PostgresStockStore, StockService, StockStore, TracingActivityLog,
};
use stockledger_inventory::MutationEvent;

const MAX_DB_CONNECTIONS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config requires a path")?;
            AppConfig::load_from(path)
        }
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;
    stockledger_observability::init(&config.log);

    // `stockledger reconcile` rebuilds the stock cache and exits.
    let reconcile_only = args.iter().any(|a| a == "reconcile");

    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(MAX_DB_CONNECTIONS)
                .connect(&url)
                .await
                .context("failed to connect to postgres")?;
            ensure_schema(&pool).await.context("failed to apply schema")?;

            run(
                &config,
                PostgresLedger::new(pool.clone()),
                PostgresCatalog::new(pool.clone()),
                PostgresStockStore::new(pool),
                reconcile_only,
            )
            .await
        }
        None => {
            warn!("database_url not set; using in-memory stores");
            run(
                &config,
                InMemoryLedger::new(),
                InMemoryCatalog::new(),
                InMemoryStockStore::new(),
                reconcile_only,
            )
            .await
        }
    }
}

async fn run<L, C, S>(config: &AppConfig, ledger: L, catalog: C, store: S, reconcile_only: bool) -> anyhow::Result<()>
where
    L: MutationLedger + 'static,
    C: EntityStore + 'static,
    S: StockStore + 'static,
{
    let bus: Arc<InMemoryEventBus<EventEnvelope<MutationEvent>>> = Arc::new(InMemoryEventBus::new());
    let cache = Arc::new(StockLevelsProjection::new(store));
    let service = Arc::new(
        StockService::new(ledger, catalog, bus.clone(), cache)
            .with_retry_policy(config.guard.retry_policy())
            .with_ledger_settings(config.ledger),
    );

    // The cache is only a copy of the ledger; make it agree before serving.
    let report = service.reconcile().await.context("stock cache reconciliation failed")?;
    for drift in &report.drift {
        warn!(pair = %drift.pair, cached = ?drift.cached, actual = drift.actual, "repaired stock cache entry");
    }
    info!(checked = report.checked, drifted = report.drift.len(), "stock cache reconciled");
    if reconcile_only {
        return Ok(());
    }

    let workers = vec![
        ProjectionWorker::spawn("stock-cache", &bus, stock_cache_handler(service.clone(), Handle::current()))
            .context("failed to spawn stock cache worker")?,
        ProjectionWorker::spawn("activity-log", &bus, activity_handler(ActivityRecorder::new(TracingActivityLog)))
            .context("failed to spawn activity worker")?,
    ];

    info!(workers = workers.len(), "stock ledger running; ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;

    info!("shutting down");
    tokio::task::spawn_blocking(move || workers.into_iter().for_each(|w| w.shutdown()))
        .await
        .context("worker shutdown panicked")?;
    Ok(())
}
