//! DB-compatible (e.g. de/serialisable) types.
//!
//! Every entity follows the same shape: an `XCore` with the actual data,
//! an `X` wrapper adding the database `_id`, and `NewX = XCore` for inserts.

mod account;
pub use account::{ensure_admin_exists, hash_password, Account, AccountCore, NewAccount, Role};

mod candidate;
pub use candidate::{Candidate, CandidateCore, NewCandidate};

mod receipt;
pub use receipt::{NewReceipt, Receipt, ReceiptCore};

mod setting;
pub use setting::{ensure_default_settings, Setting};
