use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    DomainError, DomainResult, Entity, EntityKind, LocationId, MutationId, PairKey, ProductId, UserId,
    ValueObject,
};

/// Longest note a mutation may carry, in characters.
pub const NOTE_MAX_CHARS: usize = 500;

/// Which way stock moves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// +1 for stock-in, -1 for stock-out.
    pub fn sign(self) -> i64 {
        match self {
            Direction::In => 1,
            Direction::Out => -1,
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(DomainError::validation(
                "direction",
                format!("expected 'in' or 'out', got '{other}'"),
            )),
        }
    }
}

/// Number of units moved by one mutation. Always at least one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(raw: i64) -> DomainResult<Self> {
        if raw < 1 {
            return Err(DomainError::validation("quantity", "must be at least 1"));
        }
        u32::try_from(raw)
            .map(Self)
            .map_err(|_| DomainError::validation("quantity", format!("must not exceed {}", u32::MAX)))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }
}

impl ValueObject for Quantity {}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.as_i64()
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

pub(crate) fn validate_note(note: &str) -> DomainResult<String> {
    let note = note.trim();
    if note.chars().count() > NOTE_MAX_CHARS {
        return Err(DomainError::validation(
            "note",
            format!("must be at most {NOTE_MAX_CHARS} characters"),
        ));
    }
    Ok(note.to_string())
}

/// A recorded stock movement.
///
/// Product, location and direction are fixed when the ledger records the
/// mutation; only quantity, note and date can be amended afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    id: MutationId,
    product_id: ProductId,
    location_id: LocationId,
    actor: Option<UserId>,
    direction: Direction,
    quantity: Quantity,
    note: String,
    date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Mutation {
    /// Rebuild a mutation from stored columns.
    pub fn restore(parts: MutationParts) -> Self {
        Self {
            id: parts.id,
            product_id: parts.product_id,
            location_id: parts.location_id,
            actor: parts.actor,
            direction: parts.direction,
            quantity: parts.quantity,
            note: parts.note,
            date: parts.date,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    pub fn id_typed(&self) -> MutationId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(self.product_id, self.location_id)
    }

    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Contribution of this mutation to its pair's stock.
    pub fn signed_quantity(&self) -> i64 {
        crate::projector::signed_quantity(self.direction, self.quantity)
    }
}

impl Entity for Mutation {
    type Id = MutationId;
    const KIND: EntityKind = EntityKind::Mutation;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Column set of a stored mutation, used when loading from a backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationParts {
    pub id: MutationId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub actor: Option<UserId>,
    pub direction: Direction,
    pub quantity: Quantity,
    pub note: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated mutation that has not been given an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMutation {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub actor: Option<UserId>,
    pub direction: Direction,
    pub quantity: Quantity,
    pub note: String,
    pub date: Option<NaiveDate>,
}

impl NewMutation {
    pub fn new(
        product_id: ProductId,
        location_id: LocationId,
        direction: Direction,
        quantity: Quantity,
    ) -> Self {
        Self {
            product_id,
            location_id,
            actor: None,
            direction,
            quantity,
            note: String::new(),
            date: None,
        }
    }

    pub fn with_actor(mut self, actor: Option<UserId>) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(self.product_id, self.location_id)
    }

    /// Stamp id and timestamps. The business date defaults to the creation day.
    pub fn into_mutation(self, id: MutationId, now: DateTime<Utc>) -> Mutation {
        Mutation {
            id,
            product_id: self.product_id,
            location_id: self.location_id,
            actor: self.actor,
            direction: self.direction,
            quantity: self.quantity,
            note: self.note,
            date: self.date.unwrap_or_else(|| now.date_naive()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Amendable fields of a mutation. `None` leaves a field untouched.
///
/// Direction is not amendable; flipping in/out is a delete followed by a new
/// record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationPatch {
    pub quantity: Option<Quantity>,
    pub note: Option<String>,
    pub date: Option<NaiveDate>,
}

impl MutationPatch {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none() && self.note.is_none() && self.date.is_none()
    }

    /// Quantity the mutation will carry once the patch is applied.
    pub fn resulting_quantity(&self, current: &Mutation) -> Quantity {
        self.quantity.unwrap_or(current.quantity)
    }

    pub fn apply(&self, current: &Mutation, now: DateTime<Utc>) -> Mutation {
        let mut next = current.clone();
        if let Some(quantity) = self.quantity {
            next.quantity = quantity;
        }
        if let Some(note) = &self.note {
            next.note = note.clone();
        }
        if let Some(date) = self.date {
            next.date = date;
        }
        next.updated_at = now;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(direction: Direction, quantity: i64) -> Mutation {
        NewMutation::new(
            ProductId::new(),
            LocationId::new(),
            direction,
            Quantity::new(quantity).unwrap(),
        )
        .with_note("initial")
        .into_mutation(MutationId::new(1), Utc::now())
    }

    #[test]
    fn quantity_must_be_positive() {
        assert!(Quantity::new(1).is_ok());
        for raw in [0, -3] {
            match Quantity::new(raw) {
                Err(DomainError::Validation { field, .. }) => assert_eq!(field, "quantity"),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("IN".parse::<Direction>().unwrap(), Direction::In);
        assert_eq!(" out ".parse::<Direction>().unwrap(), Direction::Out);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn date_defaults_to_creation_day() {
        let now = Utc::now();
        let mutation = NewMutation::new(
            ProductId::new(),
            LocationId::new(),
            Direction::In,
            Quantity::new(3).unwrap(),
        )
        .into_mutation(MutationId::new(9), now);
        assert_eq!(mutation.date(), now.date_naive());
        assert_eq!(mutation.created_at(), mutation.updated_at());
    }

    #[test]
    fn patch_keeps_identity_and_direction() {
        let original = sample(Direction::Out, 7);
        let later = original.created_at() + chrono::Duration::seconds(30);
        let patch = MutationPatch {
            quantity: Some(Quantity::new(10).unwrap()),
            ..MutationPatch::default()
        };

        let next = patch.apply(&original, later);
        assert_eq!(next.id_typed(), original.id_typed());
        assert_eq!(next.pair(), original.pair());
        assert_eq!(next.direction(), Direction::Out);
        assert_eq!(next.quantity().get(), 10);
        assert_eq!(next.note(), "initial");
        assert_eq!(next.created_at(), original.created_at());
        assert_eq!(next.updated_at(), later);
    }

    #[test]
    fn note_length_is_counted_in_characters() {
        let at_limit: String = "é".repeat(NOTE_MAX_CHARS);
        assert!(validate_note(&at_limit).is_ok());
        let over = format!("{at_limit}x");
        assert!(matches!(
            validate_note(&over),
            Err(DomainError::Validation { field: "note", .. })
        ));
    }

    #[test]
    fn signed_quantity_follows_direction() {
        assert_eq!(sample(Direction::In, 4).signed_quantity(), 4);
        assert_eq!(sample(Direction::Out, 4).signed_quantity(), -4);
    }
}
