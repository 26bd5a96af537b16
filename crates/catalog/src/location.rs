use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainResult, Entity, EntityKind, LocationId};

use crate::fields;

const CODE_MAX: usize = 50;
const NAME_MAX: usize = 255;
const TEXT_MAX: usize = 1000;

/// A physical place where stock is held (warehouse, shelf, shop floor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Location {
    type Id = LocationId;
    const KIND: EntityKind = EntityKind::Location;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
}

impl NewLocation {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            address: None,
            description: None,
        }
    }

    pub fn into_location(self, id: LocationId, now: DateTime<Utc>) -> DomainResult<Location> {
        Ok(Location {
            id,
            code: fields::required("code", &self.code, CODE_MAX)?,
            name: fields::required("name", &self.name, NAME_MAX)?,
            address: fields::optional("address", self.address.as_deref(), TEXT_MAX)?,
            description: fields::optional("description", self.description.as_deref(), TEXT_MAX)?,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
}

impl LocationUpdate {
    pub fn apply(&self, current: &Location, now: DateTime<Utc>) -> DomainResult<Location> {
        let mut next = current.clone();
        if let Some(code) = &self.code {
            next.code = fields::required("code", code, CODE_MAX)?;
        }
        if let Some(name) = &self.name {
            next.name = fields::required("name", name, NAME_MAX)?;
        }
        if let Some(address) = &self.address {
            next.address = fields::optional("address", Some(address), TEXT_MAX)?;
        }
        if let Some(description) = &self.description {
            next.description = fields::optional("description", Some(description), TEXT_MAX)?;
        }
        next.updated_at = now;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_address_is_stored_as_none() {
        let mut input = NewLocation::new("WH-A", "Main warehouse");
        input.address = Some("   ".to_string());
        let location = input.into_location(LocationId::new(), Utc::now()).unwrap();
        assert_eq!(location.address, None);
    }

    #[test]
    fn update_can_clear_description() {
        let mut input = NewLocation::new("WH-A", "Main warehouse");
        input.description = Some("cold storage".to_string());
        let location = input.into_location(LocationId::new(), Utc::now()).unwrap();

        let update = LocationUpdate {
            description: Some(String::new()),
            ..LocationUpdate::default()
        };
        let next = update.apply(&location, Utc::now()).unwrap();
        assert_eq!(next.description, None);
        assert_eq!(next.code, "WH-A");
    }
}
