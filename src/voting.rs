//! The voting engine: enforces the one-vote-per-account invariant and keeps
//! candidate tallies consistent with recorded receipts. Cascade deletion of
//! accounts and candidates also lives here so the ordering of steps is
//! centralised rather than duplicated per handler.

use mongodb::bson::doc;
use thiserror::Error;

use crate::model::{
    db::{Account, Candidate, NewReceipt, Receipt, ReceiptCore, Role},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// Domain failures of the voting engine. Handlers surface these as flash
/// messages; only `Db` aborts a request.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("account not found")]
    AccountNotFound,
    #[error("only voters may cast a vote")]
    ForbiddenOperation,
    #[error("account has already voted")]
    AlreadyVoted,
    #[error("candidate not found")]
    CandidateNotFound,
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
}

/// Cast a vote: create a receipt linking account and candidate, mark the
/// account as having voted, and increment the candidate's tally.
///
/// The `has_voted` flag is checked first but is only a cache; the unique
/// index on `receipts.account_id` is the source of truth. Under concurrent
/// casts for the same account, exactly one insert succeeds and every other
/// caller observes [`VoteError::AlreadyVoted`] via a duplicate-key error.
pub async fn cast_vote(
    accounts: &Coll<Account>,
    candidates: &Coll<Candidate>,
    receipts: &Coll<NewReceipt>,
    account_id: Id,
    candidate_id: Id,
) -> Result<(), VoteError> {
    let account = accounts
        .find_one(account_id.as_doc(), None)
        .await?
        .ok_or(VoteError::AccountNotFound)?;
    if account.role != Role::Voter {
        return Err(VoteError::ForbiddenOperation);
    }
    if account.has_voted {
        return Err(VoteError::AlreadyVoted);
    }

    let candidate = candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or(VoteError::CandidateNotFound)?;

    // Insert the receipt before touching the denormalised state, so a lost
    // race cannot double-count.
    let receipt = ReceiptCore::new(account.id, candidate.id);
    if let Err(err) = receipts.insert_one(receipt, None).await {
        if is_duplicate_key_error(&err) {
            return Err(VoteError::AlreadyVoted);
        }
        return Err(err.into());
    }

    accounts
        .update_one(
            account.id.as_doc(),
            doc! { "$set": { "has_voted": true, "voted_candidate": *candidate.id } },
            None,
        )
        .await?;
    candidates
        .update_one(
            candidate.id.as_doc(),
            doc! { "$inc": { "votes": 1_i64 } },
            None,
        )
        .await?;

    Ok(())
}

/// Reset the election: delete every receipt, clear every account's voted
/// state, and zero every candidate's tally.
///
/// The three steps are not atomic, but each is idempotent, so re-running
/// after a partial failure converges to the same end state.
pub async fn reset_election(
    accounts: &Coll<Account>,
    candidates: &Coll<Candidate>,
    receipts: &Coll<Receipt>,
) -> Result<(), mongodb::error::Error> {
    receipts.delete_many(doc! {}, None).await?;
    accounts
        .update_many(
            doc! {},
            doc! {
                "$set": { "has_voted": false },
                "$unset": { "voted_candidate": "" },
            },
            None,
        )
        .await?;
    candidates
        .update_many(doc! {}, doc! { "$set": { "votes": 0_i64 } }, None)
        .await?;
    Ok(())
}

/// Delete an account, cascading to its receipt first so no orphaned
/// reference survives. The affected candidate's tally is recounted from the
/// receipts rather than decremented, so a retried cascade converges.
pub async fn remove_account(
    accounts: &Coll<Account>,
    candidates: &Coll<Candidate>,
    receipts: &Coll<Receipt>,
    account_id: Id,
) -> Result<(), mongodb::error::Error> {
    if let Some(receipt) = receipts
        .find_one(doc! { "account_id": *account_id }, None)
        .await?
    {
        receipts.delete_one(receipt.id.as_doc(), None).await?;
        recount_candidate(candidates, receipts, receipt.candidate_id).await?;
    }
    accounts.delete_one(account_id.as_doc(), None).await?;
    Ok(())
}

/// Delete a candidate, cascading to its receipts and clearing the voted
/// state of every account that chose it.
pub async fn remove_candidate(
    accounts: &Coll<Account>,
    candidates: &Coll<Candidate>,
    receipts: &Coll<Receipt>,
    candidate_id: Id,
) -> Result<(), mongodb::error::Error> {
    accounts
        .update_many(
            doc! { "voted_candidate": *candidate_id },
            doc! {
                "$set": { "has_voted": false },
                "$unset": { "voted_candidate": "" },
            },
            None,
        )
        .await?;
    receipts
        .delete_many(doc! { "candidate_id": *candidate_id }, None)
        .await?;
    candidates.delete_one(candidate_id.as_doc(), None).await?;
    Ok(())
}

/// Set a candidate's tally to the number of receipts referencing it.
async fn recount_candidate(
    candidates: &Coll<Candidate>,
    receipts: &Coll<Receipt>,
    candidate_id: Id,
) -> Result<(), mongodb::error::Error> {
    let tally = receipts
        .count_documents(doc! { "candidate_id": *candidate_id }, None)
        .await?;
    candidates
        .update_one(
            candidate_id.as_doc(),
            doc! { "$set": { "votes": tally as i64 } },
            None,
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;

    use crate::model::db::{AccountCore, CandidateCore, NewAccount, NewCandidate};

    async fn insert_voter(db: &Database) -> Id {
        Coll::<NewAccount>::from_db(db)
            .insert_one(AccountCore::example_voter(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn insert_admin(db: &Database) -> Id {
        Coll::<NewAccount>::from_db(db)
            .insert_one(AccountCore::example_admin(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn insert_candidate(db: &Database, candidate: NewCandidate) -> Id {
        Coll::<NewCandidate>::from_db(db)
            .insert_one(candidate, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    #[backend_test]
    async fn first_vote_succeeds_second_fails(
        db: Database,
        accounts: Coll<Account>,
        candidates: Coll<Candidate>,
        receipts: Coll<Receipt>,
        new_receipts: Coll<NewReceipt>,
    ) {
        let voter = insert_voter(&db).await;
        let candidate = insert_candidate(&db, CandidateCore::example1()).await;

        cast_vote(&accounts, &candidates, &new_receipts, voter, candidate)
            .await
            .unwrap();

        let err = cast_vote(&accounts, &candidates, &new_receipts, voter, candidate)
            .await
            .unwrap_err();
        assert!(matches!(err, VoteError::AlreadyVoted));

        // Counter increased exactly once.
        let candidate_doc = candidates
            .find_one(candidate.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate_doc.votes, 1);

        // Flag and receipt agree.
        let account = accounts
            .find_one(voter.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(account.has_voted);
        assert_eq!(account.voted_candidate, Some(candidate));
        let receipt_count = receipts
            .count_documents(doc! { "account_id": *voter }, None)
            .await
            .unwrap();
        assert_eq!(receipt_count, 1);
    }

    #[backend_test]
    async fn tallies_track_each_voter_separately(
        db: Database,
        accounts: Coll<Account>,
        candidates: Coll<Candidate>,
        new_receipts: Coll<NewReceipt>,
    ) {
        let voter1 = insert_voter(&db).await;
        let voter2 = Coll::<NewAccount>::from_db(&db)
            .insert_one(AccountCore::example_voter2(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        let candidate1 = insert_candidate(&db, CandidateCore::example1()).await;
        let candidate2 = insert_candidate(&db, CandidateCore::example2()).await;

        cast_vote(&accounts, &candidates, &new_receipts, voter1, candidate1)
            .await
            .unwrap();
        cast_vote(&accounts, &candidates, &new_receipts, voter2, candidate2)
            .await
            .unwrap();

        for (candidate, voter) in [(candidate1, voter1), (candidate2, voter2)] {
            let candidate_doc = candidates
                .find_one(candidate.as_doc(), None)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(candidate_doc.votes, 1);
            let account = accounts.find_one(voter.as_doc(), None).await.unwrap().unwrap();
            assert_eq!(account.voted_candidate, Some(candidate));
        }
    }

    #[backend_test]
    async fn unique_index_beats_stale_flag(
        db: Database,
        accounts: Coll<Account>,
        candidates: Coll<Candidate>,
        receipts: Coll<Receipt>,
        new_receipts: Coll<NewReceipt>,
    ) {
        let voter = insert_voter(&db).await;
        let candidate = insert_candidate(&db, CandidateCore::example1()).await;

        // Simulate a lost race: a receipt exists but the flag was not yet
        // set when our read happened.
        new_receipts
            .insert_one(ReceiptCore::new(voter, candidate), None)
            .await
            .unwrap();

        let err = cast_vote(&accounts, &candidates, &new_receipts, voter, candidate)
            .await
            .unwrap_err();
        assert!(matches!(err, VoteError::AlreadyVoted));

        // The losing call must not have double-counted.
        let candidate_doc = candidates
            .find_one(candidate.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate_doc.votes, 0);
        let receipt_count = receipts.count_documents(doc! {}, None).await.unwrap();
        assert_eq!(receipt_count, 1);
    }

    #[backend_test]
    async fn admins_cannot_vote(
        db: Database,
        accounts: Coll<Account>,
        candidates: Coll<Candidate>,
        receipts: Coll<Receipt>,
        new_receipts: Coll<NewReceipt>,
    ) {
        let admin = insert_admin(&db).await;
        let candidate = insert_candidate(&db, CandidateCore::example1()).await;

        let err = cast_vote(&accounts, &candidates, &new_receipts, admin, candidate)
            .await
            .unwrap_err();
        assert!(matches!(err, VoteError::ForbiddenOperation));

        let receipt_count = receipts.count_documents(doc! {}, None).await.unwrap();
        assert_eq!(receipt_count, 0);
    }

    #[backend_test]
    async fn vote_for_unknown_candidate_fails(
        db: Database,
        accounts: Coll<Account>,
        candidates: Coll<Candidate>,
        receipts: Coll<Receipt>,
        new_receipts: Coll<NewReceipt>,
    ) {
        let voter = insert_voter(&db).await;

        let err = cast_vote(&accounts, &candidates, &new_receipts, voter, Id::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VoteError::CandidateNotFound));

        let receipt_count = receipts.count_documents(doc! {}, None).await.unwrap();
        assert_eq!(receipt_count, 0);
    }

    #[backend_test]
    async fn reset_clears_everything_and_is_idempotent(
        db: Database,
        accounts: Coll<Account>,
        candidates: Coll<Candidate>,
        receipts: Coll<Receipt>,
        new_receipts: Coll<NewReceipt>,
    ) {
        let voter = insert_voter(&db).await;
        let candidate = insert_candidate(&db, CandidateCore::example1()).await;
        cast_vote(&accounts, &candidates, &new_receipts, voter, candidate)
            .await
            .unwrap();

        for _ in 0..2 {
            reset_election(&accounts, &candidates, &receipts)
                .await
                .unwrap();

            assert_eq!(receipts.count_documents(doc! {}, None).await.unwrap(), 0);
            let account = accounts
                .find_one(voter.as_doc(), None)
                .await
                .unwrap()
                .unwrap();
            assert!(!account.has_voted);
            assert_eq!(account.voted_candidate, None);
            let candidate_doc = candidates
                .find_one(candidate.as_doc(), None)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(candidate_doc.votes, 0);
        }
    }

    #[backend_test]
    async fn deleting_account_repairs_tally(
        db: Database,
        accounts: Coll<Account>,
        candidates: Coll<Candidate>,
        receipts: Coll<Receipt>,
        new_receipts: Coll<NewReceipt>,
    ) {
        let voter = insert_voter(&db).await;
        let candidate = insert_candidate(&db, CandidateCore::example1()).await;
        cast_vote(&accounts, &candidates, &new_receipts, voter, candidate)
            .await
            .unwrap();

        remove_account(&accounts, &candidates, &receipts, voter)
            .await
            .unwrap();

        assert!(accounts
            .find_one(voter.as_doc(), None)
            .await
            .unwrap()
            .is_none());
        assert_eq!(receipts.count_documents(doc! {}, None).await.unwrap(), 0);
        let candidate_doc = candidates
            .find_one(candidate.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate_doc.votes, 0);
    }

    #[backend_test]
    async fn deleting_candidate_clears_voter_flags(
        db: Database,
        accounts: Coll<Account>,
        candidates: Coll<Candidate>,
        receipts: Coll<Receipt>,
        new_receipts: Coll<NewReceipt>,
    ) {
        let voter = insert_voter(&db).await;
        let candidate = insert_candidate(&db, CandidateCore::example1()).await;
        cast_vote(&accounts, &candidates, &new_receipts, voter, candidate)
            .await
            .unwrap();

        remove_candidate(&accounts, &candidates, &receipts, candidate)
            .await
            .unwrap();

        assert!(candidates
            .find_one(candidate.as_doc(), None)
            .await
            .unwrap()
            .is_none());
        assert_eq!(receipts.count_documents(doc! {}, None).await.unwrap(), 0);
        let account = accounts
            .find_one(voter.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(!account.has_voted);
        assert_eq!(account.voted_candidate, None);
    }

    #[backend_test]
    async fn duplicate_ballot_number_is_rejected(db: Database, candidates: Coll<Candidate>) {
        insert_candidate(&db, CandidateCore::example1()).await;

        let clash = NewCandidate::new(1, "Paslon 3", "Visi", "Misi", None);
        let err = Coll::<NewCandidate>::from_db(&db)
            .insert_one(clash, None)
            .await
            .unwrap_err();
        assert!(is_duplicate_key_error(&err));

        // No second record was created.
        assert_eq!(candidates.count_documents(doc! {}, None).await.unwrap(), 1);
    }
}
