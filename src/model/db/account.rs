use std::fmt::Display;
use std::ops::{Deref, DerefMut};

use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{Coll, Id};
use crate::Config;

/// The role of an account: a voting student or an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Voter,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voter => write!(f, "voter"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Core account data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCore {
    /// Display name.
    pub name: String,
    /// Unique login handle, always stored lowercase.
    pub username: String,
    /// Argon2-encoded password hash.
    pub password_hash: String,
    pub role: Role,
    /// Cache of "a receipt exists for this account"; the unique index on
    /// `receipts.account_id` is the source of truth.
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voted_candidate: Option<Id>,
}

impl AccountCore {
    /// Create a new account with a freshly hashed password.
    pub fn new(
        name: impl Into<String>,
        username: impl AsRef<str>,
        password: impl AsRef<[u8]>,
        role: Role,
    ) -> Result<Self, argon2::Error> {
        Ok(Self {
            name: name.into(),
            username: username.as_ref().to_lowercase(),
            password_hash: hash_password(password)?,
            role,
            has_voted: false,
            voted_candidate: None,
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Any account reaching the database went through `hash_password`,
        // so the stored hash is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// Hash a password with a random salt.
pub fn hash_password(password: impl AsRef<[u8]>) -> Result<String, argon2::Error> {
    let salt: [u8; 16] = rand::random();
    argon2::hash_encoded(password.as_ref(), &salt, &argon2::Config::default())
}

/// An account without an ID.
pub type NewAccount = AccountCore;

/// An account from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub account: AccountCore,
}

impl Deref for Account {
    type Target = AccountCore;

    fn deref(&self) -> &Self::Target {
        &self.account
    }
}

impl DerefMut for Account {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.account
    }
}

/// Ensure at least one admin account exists, creating the bootstrap admin
/// from config if the collection has none. Idempotent.
pub async fn ensure_admin_exists(
    accounts: &Coll<NewAccount>,
    config: &Config,
) -> crate::error::Result<()> {
    let existing = accounts.find_one(doc! { "role": "admin" }, None).await?;
    if existing.is_none() {
        let (username, password) = config.bootstrap_admin();
        let admin = NewAccount::new("Admin", username, password, Role::Admin)?;
        accounts.insert_one(admin, None).await?;
        info!("Created bootstrap admin account '{username}'");
    }
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AccountCore {
        pub fn example_voter() -> Self {
            Self::new("Peserta 1", "peserta1", "peserta123", Role::Voter).unwrap()
        }

        pub fn example_voter2() -> Self {
            Self::new("Peserta 2", "peserta2", "peserta123", Role::Voter).unwrap()
        }

        pub fn example_admin() -> Self {
            Self::new("Panitia", "panitia", "panitia123", Role::Admin).unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let account = AccountCore::new("Test", "Test", "hunter2", Role::Voter).unwrap();
        assert!(account.verify_password("hunter2"));
        assert!(!account.verify_password("hunter3"));
    }

    #[test]
    fn usernames_are_lowercased() {
        let account = AccountCore::new("Test", "MixedCase", "pw", Role::Voter).unwrap();
        assert_eq!(account.username, "mixedcase");
    }

    #[test]
    fn role_serialises_lowercase() {
        assert_eq!(
            mongodb::bson::to_bson(&Role::Voter).unwrap(),
            mongodb::bson::Bson::String("voter".to_string())
        );
        assert_eq!(
            mongodb::bson::to_bson(&Role::Admin).unwrap(),
            mongodb::bson::Bson::String("admin".to_string())
        );
    }
}
