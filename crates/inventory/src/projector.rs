//! Stock projector: derive a pair's stock from its mutations.

use stockledger_core::MutationId;

use crate::mutation::{Direction, Mutation, Quantity};

pub fn signed_quantity(direction: Direction, quantity: Quantity) -> i64 {
    direction.sign() * quantity.as_i64()
}

/// Sum of signed quantities, skipping `exclude` when given.
///
/// Pure and order-independent. Callers pass the mutations of one pair; no
/// existence checks happen here.
pub fn project<'a, I>(mutations: I, exclude: Option<MutationId>) -> i64
where
    I: IntoIterator<Item = &'a Mutation>,
{
    mutations
        .into_iter()
        .filter(|m| Some(m.id_typed()) != exclude)
        .map(Mutation::signed_quantity)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_core::{LocationId, ProductId};

    use crate::mutation::NewMutation;

    fn history(moves: &[(Direction, i64)]) -> Vec<Mutation> {
        let product = ProductId::new();
        let location = LocationId::new();
        moves
            .iter()
            .enumerate()
            .map(|(i, (direction, q))| {
                NewMutation::new(product, location, *direction, Quantity::new(*q).unwrap())
                    .into_mutation(MutationId::new(i as u64 + 1), Utc::now())
            })
            .collect()
    }

    #[test]
    fn empty_history_projects_to_zero() {
        assert_eq!(project(&Vec::<Mutation>::new(), None), 0);
    }

    #[test]
    fn excluding_a_mutation_removes_its_contribution() {
        let mutations = history(&[(Direction::In, 10), (Direction::Out, 7)]);
        assert_eq!(project(&mutations, None), 3);
        assert_eq!(project(&mutations, Some(MutationId::new(2))), 10);
        assert_eq!(project(&mutations, Some(MutationId::new(1))), -7);
        assert_eq!(project(&mutations, Some(MutationId::new(99))), 3);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn moves() -> impl Strategy<Value = Vec<(Direction, i64)>> {
            prop::collection::vec(
                (prop_oneof![Just(Direction::In), Just(Direction::Out)], 1i64..1_000),
                0..40,
            )
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: the fold does not depend on record order.
            #[test]
            fn projection_is_order_independent(moves in moves()) {
                let mutations = history(&moves);
                let mut reversed = mutations.clone();
                reversed.reverse();
                prop_assert_eq!(project(&mutations, None), project(&reversed, None));
            }

            /// Property: reading twice gives the same answer.
            #[test]
            fn projection_is_idempotent(moves in moves()) {
                let mutations = history(&moves);
                prop_assert_eq!(project(&mutations, None), project(&mutations, None));
            }

            /// Property: stock = stock excluding m + m's signed quantity.
            #[test]
            fn exclusion_splits_the_sum(moves in moves(), pick in any::<prop::sample::Index>()) {
                let mutations = history(&moves);
                prop_assume!(!mutations.is_empty());
                let m = &mutations[pick.index(mutations.len())];
                prop_assert_eq!(
                    project(&mutations, None),
                    project(&mutations, Some(m.id_typed())) + m.signed_quantity()
                );
            }
        }
    }
}
