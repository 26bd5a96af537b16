use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Entity, EntityKind, UserId};

use crate::fields;

/// A person who records stock movements.
///
/// Only identity and display data live here; credentials and sessions are
/// someone else's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> DomainResult<User> {
        let email = fields::required("email", &self.email, 255)?.to_lowercase();
        if !email.contains('@') {
            return Err(DomainError::validation("email", "must contain '@'"));
        }
        Ok(User {
            id,
            name: fields::required("name", &self.name, 255)?,
            email,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalised_to_lowercase() {
        let user = NewUser::new("Ana", " Ana@Example.COM ")
            .into_user(UserId::new(), Utc::now())
            .unwrap();
        assert_eq!(user.email, "ana@example.com");
    }

    #[test]
    fn email_without_at_sign_is_rejected() {
        let err = NewUser::new("Ana", "ana.example.com")
            .into_user(UserId::new(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "email", .. }));
    }
}
