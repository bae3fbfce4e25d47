use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    Account, Candidate, NewAccount, NewCandidate, NewReceipt, Receipt, Setting,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Account collections
const ACCOUNTS: &str = "accounts";
impl MongoCollection for Account {
    const NAME: &'static str = ACCOUNTS;
}
impl MongoCollection for NewAccount {
    const NAME: &'static str = ACCOUNTS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Receipt collections
const RECEIPTS: &str = "receipts";
impl MongoCollection for Receipt {
    const NAME: &'static str = RECEIPTS;
}
impl MongoCollection for NewReceipt {
    const NAME: &'static str = RECEIPTS;
}

// Settings collection
const SETTINGS: &str = "settings";
impl MongoCollection for Setting {
    const NAME: &'static str = SETTINGS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent. The unique index on `receipts.account_id`
/// is what makes the one-vote-per-account invariant hold under concurrent
/// submissions; the application-level `has_voted` flag is only a cache.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Account collection: login handles are unique.
    let account_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Account>::from_db(db)
        .create_index(account_index, None)
        .await?;

    // Candidate collection: ballot numbers are unique.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"number": 1})
        .options(unique.clone())
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Receipt collection: at most one receipt per account.
    let receipt_index = IndexModel::builder()
        .keys(doc! {"account_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Receipt>::from_db(db)
        .create_index(receipt_index, None)
        .await?;

    // Settings collection: keys are unique.
    let setting_index = IndexModel::builder()
        .keys(doc! {"key": 1})
        .options(unique)
        .build();
    Coll::<Setting>::from_db(db)
        .create_index(setting_index, None)
        .await?;

    Ok(())
}
