//! Integration tests for the full write pipeline.
//!
//! Tests: Command → Guard → Ledger → EventBus → stock cache / activity log
//!
//! Verifies:
//! - accepted commands reach the cache and the activity log
//! - duplicate and lost deliveries leave the cache consistent with the ledger
//! - stock never goes negative under any accepted command sequence

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use stockledger_catalog::{EntityWriter, InMemoryCatalog, NewLocation, NewProduct, NewUser};
    use stockledger_core::{MutationId, PairKey, UserId};
    use stockledger_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use stockledger_inventory::{AmendMutation, Direction, MutationEvent, RecordMutation};

    use crate::activity::{ActivityRecorder, InMemoryActivityLog};
    use crate::ledger::{InMemoryLedger, MutationLedger};
    use crate::projections::{Applied, StockLevelsProjection};
    use crate::read_model::InMemoryStockStore;
    use crate::retry::RetryPolicy;
    use crate::service::{ServiceError, StockService};
    use crate::workers::{activity_handler, stock_cache_handler, ProjectionWorker};

    type Bus = Arc<InMemoryEventBus<EventEnvelope<MutationEvent>>>;
    type Service = StockService<Arc<InMemoryLedger>, Arc<InMemoryCatalog>, Bus, InMemoryStockStore>;

    struct Setup {
        service: Arc<Service>,
        bus: Bus,
        pair: PairKey,
        user: UserId,
    }

    async fn setup() -> Setup {
        let catalog = Arc::new(InMemoryCatalog::new());
        let product = catalog.add_product(NewProduct::new("BOLT-8", "Bolt M8")).await.unwrap();
        let location = catalog.add_location(NewLocation::new("A-01", "Aisle 1")).await.unwrap();
        let user = catalog.add_user(NewUser::new("Sam", "sam@example.com")).await.unwrap();

        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let cache = Arc::new(StockLevelsProjection::new(InMemoryStockStore::new()));
        let service = StockService::new(Arc::new(InMemoryLedger::new()), catalog, bus.clone(), cache)
            .with_retry_policy(RetryPolicy::fixed(3, Duration::from_millis(1)));

        Setup {
            service: Arc::new(service),
            bus,
            pair: PairKey::new(product.id, location.id),
            user: user.id,
        }
    }

    impl Setup {
        fn cmd(&self, direction: Direction, quantity: i64) -> RecordMutation {
            RecordMutation::new(self.pair.product_id, self.pair.location_id, direction, quantity)
        }

        async fn ledger_stock(&self) -> i64 {
            self.service
                .current_stock(self.pair.product_id, self.pair.location_id)
                .await
                .unwrap()
        }

        /// Wait until the cache has caught up with the ledger revision.
        async fn wait_for_cache(&self) {
            let target = self.service.ledger().load_pair(self.pair).await.unwrap().revision;
            for _ in 0..200 {
                let level = self.service.cache().get(self.pair).await.unwrap();
                if level.revision >= target {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("stock cache did not reach revision {target}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn workers_keep_cache_and_activity_in_step_with_the_ledger() {
        let s = setup().await;
        let log = Arc::new(InMemoryActivityLog::new());

        let cache_worker = ProjectionWorker::spawn(
            "stock-cache",
            &s.bus,
            stock_cache_handler(s.service.clone(), tokio::runtime::Handle::current()),
        )
        .unwrap();
        let activity_worker = ProjectionWorker::spawn(
            "activity",
            &s.bus,
            activity_handler(ActivityRecorder::new(log.clone())),
        )
        .unwrap();

        let delivery = s.service.record(Some(s.user), s.cmd(Direction::In, 10)).await.unwrap();
        let pick = s.service.record(Some(s.user), s.cmd(Direction::Out, 4)).await.unwrap();
        s.service.amend(None, pick.id, AmendMutation::new_quantity(6)).await.unwrap();
        let err = s.service.remove(Some(s.user), delivery.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientStock { .. }));

        s.wait_for_cache().await;
        let cached = s.service.cache().get(s.pair).await.unwrap();
        assert_eq!(cached.quantity, 4);
        assert_eq!(cached.quantity, s.ledger_stock().await);

        cache_worker.shutdown();
        activity_worker.shutdown();

        let records = log.records();
        let actions: Vec<&str> = records.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["create", "create", "update"]);
        assert!(records.iter().all(|r| r.module == "mutation" && r.pair == s.pair));
        assert_eq!(records[0].actor, Some(s.user));
        assert_eq!(records[2].actor, None);
        assert_eq!(records[2].subject, pick.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn redelivered_facts_do_not_double_count() {
        let s = setup().await;
        let subscription = s.bus.subscribe();

        s.service.record(None, s.cmd(Direction::In, 10)).await.unwrap();
        s.service.record(None, s.cmd(Direction::Out, 3)).await.unwrap();
        let published = subscription.drain();
        assert_eq!(published.len(), 2);

        let cache = s.service.cache();
        for envelope in &published {
            assert!(matches!(cache.apply(envelope).await.unwrap(), Applied::Updated(_)));
        }
        for envelope in &published {
            assert_eq!(cache.apply(envelope).await.unwrap(), Applied::Duplicate);
        }

        let level = cache.get(s.pair).await.unwrap();
        assert_eq!((level.quantity, level.revision), (7, 2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn a_lost_fact_is_repaired_from_the_ledger() {
        let s = setup().await;
        let subscription = s.bus.subscribe();

        for (direction, q) in [(Direction::In, 10), (Direction::In, 5), (Direction::Out, 2)] {
            s.service.record(None, s.cmd(direction, q)).await.unwrap();
        }
        let mut published = subscription.drain();
        // Revision 2 never arrives.
        published.remove(1);

        let mut handler = stock_cache_handler(s.service.clone(), tokio::runtime::Handle::current());
        tokio::task::spawn_blocking(move || {
            for envelope in published {
                handler(envelope).unwrap();
            }
        })
        .await
        .unwrap();

        let level = s.service.cache().get(s.pair).await.unwrap();
        assert_eq!((level.quantity, level.revision), (13, 3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_withdrawals_stop_at_zero() {
        let s = setup().await;
        s.service.record(None, s.cmd(Direction::In, 10)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let service = s.service.clone();
            let cmd = s.cmd(Direction::Out, 1);
            handles.push(tokio::spawn(async move { service.record(None, cmd).await }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(ServiceError::InsufficientStock { available, requested }) => {
                    assert_eq!((available, requested), (0, 1));
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(accepted, 10);
        assert_eq!(s.ledger_stock().await, 0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Record(Direction, i64),
            Amend(usize, i64),
            Remove(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (any::<bool>(), 1i64..20).prop_map(|(inbound, q)| {
                    Op::Record(if inbound { Direction::In } else { Direction::Out }, q)
                }),
                (any::<usize>(), 1i64..20).prop_map(|(i, q)| Op::Amend(i, q)),
                any::<usize>().prop_map(Op::Remove),
            ]
        }

        async fn run(ops: Vec<Op>) -> Result<(), TestCaseError> {
            let s = setup().await;
            let mut live: Vec<MutationId> = Vec::new();

            for op in ops {
                let result = match op {
                    Op::Record(direction, q) => s
                        .service
                        .record(None, s.cmd(direction, q))
                        .await
                        .map(|view| live.push(view.id)),
                    Op::Amend(i, q) if !live.is_empty() => s
                        .service
                        .amend(None, live[i % live.len()], AmendMutation::new_quantity(q))
                        .await
                        .map(|_| ()),
                    Op::Remove(i) if !live.is_empty() => {
                        let id = live[i % live.len()];
                        s.service.remove(None, id).await.map(|_| live.retain(|m| *m != id))
                    }
                    _ => Ok(()),
                };
                match result {
                    Ok(()) | Err(ServiceError::InsufficientStock { .. }) => {}
                    Err(other) => return Err(TestCaseError::fail(format!("unexpected error: {other:?}"))),
                }
                prop_assert!(s.ledger_stock().await >= 0);
            }

            let report = s.service.reconcile().await.map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(report.checked <= 1);
            let cached = s.service.cache().get(s.pair).await.map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(cached.quantity, s.ledger_stock().await);
            Ok(())
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 32, ..ProptestConfig::default() })]

            #[test]
            fn accepted_commands_never_drive_stock_negative(ops in proptest::collection::vec(op(), 1..40)) {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(1)
                    .enable_all()
                    .build()
                    .unwrap();
                runtime.block_on(run(ops))?;
            }
        }
    }
}
