use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core receipt data: proof that one account voted for one candidate.
///
/// Receipts are immutable once created; they are only ever removed by the
/// administrative reset or by cascade deletion of their account/candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptCore {
    /// The voting account. A unique index on this field guarantees at most
    /// one receipt per account.
    pub account_id: Id,
    pub candidate_id: Id,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl ReceiptCore {
    /// Create a receipt timestamped now.
    pub fn new(account_id: Id, candidate_id: Id) -> Self {
        Self {
            account_id,
            candidate_id,
            cast_at: Utc::now(),
        }
    }
}

/// A receipt without an ID.
pub type NewReceipt = ReceiptCore;

/// A receipt from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub receipt: ReceiptCore,
}

impl Deref for Receipt {
    type Target = ReceiptCore;

    fn deref(&self) -> &Self::Target {
        &self.receipt
    }
}
