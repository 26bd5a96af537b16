//! Background consumers of the committed-fact stream.

pub mod projection_worker;

pub use projection_worker::{ProjectionWorker, WorkerHandle};

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::warn;

use stockledger_catalog::EntityStore;
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::MutationEvent;

use crate::activity::{ActivityError, ActivityLog, ActivityRecorder};
use crate::ledger::MutationLedger;
use crate::projections::StockProjectionError;
use crate::read_model::StockStore;
use crate::service::{ServiceError, StockService};

/// Worker handler feeding the stock cache.
///
/// Worker threads live outside the runtime, so each message is driven to
/// completion on `runtime`. A revision gap means facts were lost on the way;
/// the pair is then rebuilt from the ledger instead.
pub fn stock_cache_handler<L, C, B, S>(
    service: Arc<StockService<L, C, B, S>>,
    runtime: Handle,
) -> impl FnMut(EventEnvelope<MutationEvent>) -> Result<(), ServiceError> + Send + 'static
where
    L: MutationLedger + 'static,
    C: EntityStore + 'static,
    B: EventBus<EventEnvelope<MutationEvent>> + 'static,
    S: StockStore + 'static,
{
    move |envelope| {
        runtime.block_on(async {
            match service.cache().apply(&envelope).await {
                Ok(_) => Ok(()),
                Err(StockProjectionError::Gap { pair, last, found }) => {
                    warn!(pair = %pair, last, found, "stock cache gap, rebuilding pair");
                    service.rebuild_pair(pair).await.map(|_| ())
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Worker handler forwarding facts to an activity log.
pub fn activity_handler<A>(
    recorder: ActivityRecorder<A>,
) -> impl FnMut(EventEnvelope<MutationEvent>) -> Result<(), ActivityError> + Send + 'static
where
    A: ActivityLog + 'static,
{
    move |envelope| recorder.handle(&envelope)
}
