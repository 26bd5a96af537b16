use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::MutationId;
use stockledger_events::Event;

use crate::mutation::{Direction, Mutation};

/// Event: MutationRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecorded {
    pub mutation_id: MutationId,
    pub direction: Direction,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MutationAmended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationAmended {
    pub mutation_id: MutationId,
    pub direction: Direction,
    pub previous_quantity: u32,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MutationRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRemoved {
    pub mutation_id: MutationId,
    pub direction: Direction,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Committed ledger facts. The pair they belong to travels in the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationEvent {
    Recorded(MutationRecorded),
    Amended(MutationAmended),
    Removed(MutationRemoved),
}

impl MutationEvent {
    pub fn recorded(mutation: &Mutation) -> Self {
        MutationEvent::Recorded(MutationRecorded {
            mutation_id: mutation.id_typed(),
            direction: mutation.direction(),
            quantity: mutation.quantity().get(),
            occurred_at: mutation.created_at(),
        })
    }

    pub fn amended(before: &Mutation, after: &Mutation) -> Self {
        MutationEvent::Amended(MutationAmended {
            mutation_id: after.id_typed(),
            direction: after.direction(),
            previous_quantity: before.quantity().get(),
            quantity: after.quantity().get(),
            occurred_at: after.updated_at(),
        })
    }

    pub fn removed(mutation: &Mutation, at: DateTime<Utc>) -> Self {
        MutationEvent::Removed(MutationRemoved {
            mutation_id: mutation.id_typed(),
            direction: mutation.direction(),
            quantity: mutation.quantity().get(),
            occurred_at: at,
        })
    }

    pub fn mutation_id(&self) -> MutationId {
        match self {
            MutationEvent::Recorded(e) => e.mutation_id,
            MutationEvent::Amended(e) => e.mutation_id,
            MutationEvent::Removed(e) => e.mutation_id,
        }
    }

    /// Change this fact makes to the pair's stock.
    pub fn stock_delta(&self) -> i64 {
        match self {
            MutationEvent::Recorded(e) => e.direction.sign() * i64::from(e.quantity),
            MutationEvent::Amended(e) => {
                e.direction.sign() * (i64::from(e.quantity) - i64::from(e.previous_quantity))
            }
            MutationEvent::Removed(e) => -e.direction.sign() * i64::from(e.quantity),
        }
    }

    /// Short verb for activity records ("create", "update", "delete").
    pub fn action(&self) -> &'static str {
        match self {
            MutationEvent::Recorded(_) => "create",
            MutationEvent::Amended(_) => "update",
            MutationEvent::Removed(_) => "delete",
        }
    }
}

impl Event for MutationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MutationEvent::Recorded(_) => "stock.mutation.recorded",
            MutationEvent::Amended(_) => "stock.mutation.amended",
            MutationEvent::Removed(_) => "stock.mutation.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MutationEvent::Recorded(e) => e.occurred_at,
            MutationEvent::Amended(e) => e.occurred_at,
            MutationEvent::Removed(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{MutationPatch, NewMutation, Quantity};
    use stockledger_core::{LocationId, ProductId};

    fn out_seven() -> Mutation {
        NewMutation::new(
            ProductId::new(),
            LocationId::new(),
            Direction::Out,
            Quantity::new(7).unwrap(),
        )
        .into_mutation(MutationId::new(3), Utc::now())
    }

    #[test]
    fn deltas_mirror_the_ledger_change() {
        let before = out_seven();
        assert_eq!(MutationEvent::recorded(&before).stock_delta(), -7);

        let patch = MutationPatch {
            quantity: Some(Quantity::new(10).unwrap()),
            ..MutationPatch::default()
        };
        let after = patch.apply(&before, Utc::now());
        assert_eq!(MutationEvent::amended(&before, &after).stock_delta(), -3);

        assert_eq!(MutationEvent::removed(&after, Utc::now()).stock_delta(), 10);
    }

    #[test]
    fn event_types_are_stable() {
        let m = out_seven();
        assert_eq!(MutationEvent::recorded(&m).event_type(), "stock.mutation.recorded");
        assert_eq!(MutationEvent::removed(&m, Utc::now()).action(), "delete");
    }
}
