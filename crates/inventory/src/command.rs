use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainResult, LocationId, ProductId, UserId};

use crate::mutation::{validate_note, Direction, MutationPatch, NewMutation, Quantity};

/// Command: record a new stock movement (raw caller input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMutation {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub direction: Direction,
    pub quantity: i64,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl RecordMutation {
    pub fn new(
        product_id: ProductId,
        location_id: LocationId,
        direction: Direction,
        quantity: i64,
    ) -> Self {
        Self {
            product_id,
            location_id,
            direction,
            quantity,
            note: String::new(),
            date: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Field-level validation. References are checked by the caller against
    /// the entity store.
    pub fn validate(self, actor: Option<UserId>) -> DomainResult<NewMutation> {
        let quantity = Quantity::new(self.quantity)?;
        let note = validate_note(&self.note)?;
        Ok(NewMutation {
            product_id: self.product_id,
            location_id: self.location_id,
            actor,
            direction: self.direction,
            quantity,
            note,
            date: self.date,
        })
    }
}

/// Command: amend quantity, note or date of an existing mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendMutation {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl AmendMutation {
    pub fn new_quantity(quantity: i64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    pub fn new_note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }

    pub fn validate(self) -> DomainResult<MutationPatch> {
        Ok(MutationPatch {
            quantity: self.quantity.map(Quantity::new).transpose()?,
            note: self.note.as_deref().map(validate_note).transpose()?,
            date: self.date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::DomainError;

    #[test]
    fn record_rejects_zero_quantity() {
        let cmd = RecordMutation::new(ProductId::new(), LocationId::new(), Direction::Out, 0);
        match cmd.validate(None) {
            Err(DomainError::Validation { field, .. }) => assert_eq!(field, "quantity"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn record_carries_actor_and_trimmed_note() {
        let actor = UserId::new();
        let new = RecordMutation::new(ProductId::new(), LocationId::new(), Direction::In, 5)
            .with_note("  delivery #12 ")
            .validate(Some(actor))
            .unwrap();
        assert_eq!(new.actor, Some(actor));
        assert_eq!(new.note, "delivery #12");
        assert_eq!(new.quantity.get(), 5);
    }

    #[test]
    fn amend_validates_only_present_fields() {
        let patch = AmendMutation::new_note("recount").validate().unwrap();
        assert_eq!(patch.quantity, None);
        assert_eq!(patch.note.as_deref(), Some("recount"));

        assert!(AmendMutation::new_quantity(-1).validate().is_err());
    }
}
