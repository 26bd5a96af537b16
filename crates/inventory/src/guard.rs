//! Consistency guard: approve or reject ledger changes so that no pair's
//! stock ever drops below zero.
//!
//! Each check receives the stock it needs already projected (see
//! [`crate::projector::project`]). For updates and deletes that is the stock
//! *excluding* the mutation under change, so the decision does not depend on
//! the value being replaced. Callers must hold the pair stable between the
//! projection and the write.

use stockledger_core::{DomainError, DomainResult};

use crate::mutation::{Direction, Mutation, Quantity};

/// Create: `in` is always approved; `out` needs `current_stock >= quantity`.
pub fn check_create(direction: Direction, quantity: Quantity, current_stock: i64) -> DomainResult<()> {
    match direction {
        Direction::In => Ok(()),
        Direction::Out => {
            if current_stock >= quantity.as_i64() {
                Ok(())
            } else {
                Err(DomainError::insufficient_stock(current_stock, quantity.as_i64()))
            }
        }
    }
}

/// Update of `existing` to `new_quantity`.
///
/// - `out` growing: the rest of the pair must cover the new quantity.
/// - `in` shrinking: the rest of the pair plus the new quantity must stay >= 0.
/// - anything else (note/date edits, `out` shrinking, `in` growing) passes.
pub fn check_update(existing: &Mutation, new_quantity: Quantity, stock_excluding: i64) -> DomainResult<()> {
    let old = existing.quantity();
    match existing.direction() {
        Direction::Out if new_quantity > old => {
            if stock_excluding >= new_quantity.as_i64() {
                Ok(())
            } else {
                Err(DomainError::insufficient_stock(stock_excluding, new_quantity.as_i64()))
            }
        }
        Direction::In if new_quantity < old => {
            if stock_excluding + new_quantity.as_i64() >= 0 {
                Ok(())
            } else {
                // Reported as a withdrawal of the reduction from current stock.
                Err(DomainError::insufficient_stock(
                    stock_excluding + old.as_i64(),
                    old.as_i64() - new_quantity.as_i64(),
                ))
            }
        }
        _ => Ok(()),
    }
}

/// Delete of `existing`.
///
/// Removing an `in` is approved iff the rest of the pair is non-negative.
/// Removing an `out` only raises stock and always passes.
pub fn check_delete(existing: &Mutation, stock_excluding: i64) -> DomainResult<()> {
    match existing.direction() {
        Direction::In if stock_excluding < 0 => Err(DomainError::insufficient_stock(
            stock_excluding + existing.quantity().as_i64(),
            existing.quantity().as_i64(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_core::{LocationId, MutationId, ProductId};

    use crate::mutation::NewMutation;
    use crate::projector::project;

    fn qty(raw: i64) -> Quantity {
        Quantity::new(raw).unwrap()
    }

    fn mutation(id: u64, direction: Direction, quantity: i64) -> Mutation {
        NewMutation::new(ProductId::new(), LocationId::new(), direction, qty(quantity))
            .into_mutation(MutationId::new(id), Utc::now())
    }

    fn expect_insufficient(result: DomainResult<()>, available: i64, requested: i64) {
        match result {
            Err(DomainError::InsufficientStock {
                available: a,
                requested: r,
            }) => {
                assert_eq!(a, available);
                assert_eq!(r, requested);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn out_on_empty_pair_reports_zero_available() {
        expect_insufficient(check_create(Direction::Out, qty(1), 0), 0, 1);
        assert!(check_create(Direction::In, qty(1), 0).is_ok());
    }

    #[test]
    fn out_is_bounded_by_current_stock() {
        assert!(check_create(Direction::Out, qty(7), 10).is_ok());
        expect_insufficient(check_create(Direction::Out, qty(4), 3), 3, 4);
    }

    #[test]
    fn growing_an_out_is_bounded_by_stock_excluding_itself() {
        let out = mutation(2, Direction::Out, 7);
        assert!(check_update(&out, qty(10), 10).is_ok());
        expect_insufficient(check_update(&out, qty(11), 10), 10, 11);
    }

    #[test]
    fn shrinking_an_out_or_growing_an_in_always_passes() {
        assert!(check_update(&mutation(2, Direction::Out, 7), qty(1), 0).is_ok());
        assert!(check_update(&mutation(1, Direction::In, 3), qty(300), -3).is_ok());
        assert!(check_update(&mutation(1, Direction::In, 3), qty(3), -3).is_ok());
    }

    #[test]
    fn shrinking_an_in_below_what_was_withdrawn_is_rejected() {
        // in 10 (self), out 6 elsewhere: stock excluding self is -6.
        let inbound = mutation(1, Direction::In, 10);
        assert!(check_update(&inbound, qty(6), -6).is_ok());
        expect_insufficient(check_update(&inbound, qty(5), -6), 4, 5);
    }

    #[test]
    fn deleting_the_only_in_leaves_zero() {
        let inbound = mutation(1, Direction::In, 10);
        assert!(check_delete(&inbound, 0).is_ok());
    }

    #[test]
    fn deleting_an_in_that_covers_an_out_is_rejected() {
        let inbound = mutation(1, Direction::In, 10);
        expect_insufficient(check_delete(&inbound, -5), 5, 10);
    }

    #[test]
    fn deleting_an_out_always_passes() {
        assert!(check_delete(&mutation(2, Direction::Out, 7), 3).is_ok());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Create(Direction, i64),
            Update(prop::sample::Index, i64),
            Delete(prop::sample::Index),
        }

        fn op() -> impl Strategy<Value = Op> {
            let direction = prop_oneof![Just(Direction::In), Just(Direction::Out)];
            prop_oneof![
                (direction, 1i64..50).prop_map(|(d, q)| Op::Create(d, q)),
                (any::<prop::sample::Index>(), 1i64..50).prop_map(|(i, q)| Op::Update(i, q)),
                any::<prop::sample::Index>().prop_map(Op::Delete),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: whatever the guard accepts, a pair never goes negative.
            #[test]
            fn accepted_sequences_keep_stock_non_negative(ops in prop::collection::vec(op(), 1..60)) {
                let product = ProductId::new();
                let location = LocationId::new();
                let mut ledger: Vec<Mutation> = Vec::new();
                let mut next_id = 1u64;

                for op in ops {
                    match op {
                        Op::Create(direction, q) => {
                            let quantity = qty(q);
                            if check_create(direction, quantity, project(&ledger, None)).is_ok() {
                                ledger.push(
                                    NewMutation::new(product, location, direction, quantity)
                                        .into_mutation(MutationId::new(next_id), Utc::now()),
                                );
                                next_id += 1;
                            }
                        }
                        Op::Update(pick, q) => {
                            if ledger.is_empty() {
                                continue;
                            }
                            let i = pick.index(ledger.len());
                            let quantity = qty(q);
                            let rest = project(&ledger, Some(ledger[i].id_typed()));
                            if check_update(&ledger[i], quantity, rest).is_ok() {
                                let patch = crate::mutation::MutationPatch {
                                    quantity: Some(quantity),
                                    ..Default::default()
                                };
                                ledger[i] = patch.apply(&ledger[i], Utc::now());
                            }
                        }
                        Op::Delete(pick) => {
                            if ledger.is_empty() {
                                continue;
                            }
                            let i = pick.index(ledger.len());
                            let rest = project(&ledger, Some(ledger[i].id_typed()));
                            if check_delete(&ledger[i], rest).is_ok() {
                                ledger.remove(i);
                            }
                        }
                    }
                    prop_assert!(project(&ledger, None) >= 0);
                }
            }
        }
    }
}
