use mongodb::{bson::doc, options::FindOptions};
use rocket::{
    form::Form,
    futures::TryStreamExt,
    request::FlashMessage,
    response::{Flash, Redirect},
    Route,
};
use rocket_dyn_templates::{context, Template};

use crate::error::{Error, Result};
use crate::model::{
    auth::{AuthToken, VoterUser},
    db::{Account, Candidate, NewReceipt, Setting},
    mongodb::{Coll, Id},
};
use crate::voting::{cast_vote, VoteError};

use super::{public::PageOrRedirect, PageContext};

pub fn routes() -> Vec<Route> {
    routes![list, confirm, cast]
}

#[get("/voting")]
async fn list(
    token: AuthToken<VoterUser>,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template> {
    let account = account_for(&token, &accounts).await?;

    let by_number = FindOptions::builder().sort(doc! { "number": 1 }).build();
    let ballot: Vec<Candidate> = candidates.find(None, by_number).await?.try_collect().await?;

    let ctx = PageContext::load(&settings, flash).await?;
    Ok(Template::render(
        "voting/list",
        context! {
            ctx,
            has_voted: account.has_voted,
            voter_name: account.name.clone(),
            candidates: ballot.iter().map(candidate_card).collect::<Vec<_>>(),
        },
    ))
}

#[get("/voting/confirm/<candidate_id>")]
async fn confirm(
    token: AuthToken<VoterUser>,
    candidate_id: Id,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    settings: Coll<Setting>,
) -> Result<PageOrRedirect> {
    let account = account_for(&token, &accounts).await?;
    if account.has_voted {
        return Ok(PageOrRedirect::Redirect(Redirect::to(uri!("/voting"))));
    }
    let candidate = match candidates.find_one(candidate_id.as_doc(), None).await? {
        Some(candidate) => candidate,
        None => return Ok(PageOrRedirect::Redirect(Redirect::to(uri!("/voting")))),
    };

    let ctx = PageContext::load(&settings, None).await?;
    Ok(PageOrRedirect::Page(Template::render(
        "voting/confirm",
        context! {
            ctx,
            candidate: candidate_card(&candidate),
        },
    )))
}

#[derive(FromForm)]
struct VoteForm {
    candidate_id: Id,
}

#[post("/voting", data = "<form>")]
async fn cast(
    token: AuthToken<VoterUser>,
    form: Form<VoteForm>,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    receipts: Coll<NewReceipt>,
) -> Result<Flash<Redirect>> {
    let outcome = cast_vote(
        &accounts,
        &candidates,
        &receipts,
        token.id(),
        form.candidate_id,
    )
    .await;

    let back = Redirect::to(uri!("/voting"));
    match outcome {
        Ok(()) => Ok(Flash::success(
            back,
            "Terima kasih, suara Anda telah direkam.",
        )),
        Err(VoteError::AlreadyVoted) => Ok(Flash::error(back, "Anda sudah melakukan voting")),
        Err(VoteError::CandidateNotFound) => Ok(Flash::error(back, "Kandidat tidak ditemukan")),
        Err(VoteError::ForbiddenOperation) => Ok(Flash::error(
            Redirect::to(uri!("/")),
            "Admin tidak dapat melakukan voting",
        )),
        Err(VoteError::AccountNotFound) => Ok(Flash::error(
            Redirect::to(uri!("/login")),
            "Akun tidak ditemukan, silakan login ulang",
        )),
        Err(VoteError::Db(err)) => Err(err.into()),
    }
}

/// The template-facing slice of a candidate.
#[derive(serde::Serialize)]
pub struct CandidateCard {
    pub id: String,
    pub number: u32,
    pub name: String,
    pub photo_path: Option<String>,
    pub vision: String,
    pub mission: String,
}

pub fn candidate_card(candidate: &Candidate) -> CandidateCard {
    CandidateCard {
        id: candidate.id.to_string(),
        number: candidate.number,
        name: candidate.name.clone(),
        photo_path: candidate.photo_path.clone(),
        vision: candidate.vision.clone(),
        mission: candidate.mission.clone(),
    }
}

/// Look up the voting account behind a token; a valid token for a deleted
/// account is treated as not found.
async fn account_for(token: &AuthToken<VoterUser>, accounts: &Coll<Account>) -> Result<Account> {
    accounts
        .find_one(token.id().as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Account with ID {}", token.id())))
}

#[cfg(test)]
mod tests {
    use mongodb::{bson::doc, Database};
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;

    use crate::model::db::{Candidate, CandidateCore, NewCandidate, Receipt};
    use crate::model::mongodb::{Coll, Id};

    #[backend_test(voter)]
    async fn casting_via_the_form_records_a_receipt(
        client: Client,
        db: Database,
        candidates: Coll<Candidate>,
        receipts: Coll<Receipt>,
    ) {
        let candidate: Id = Coll::<NewCandidate>::from_db(&db)
            .insert_one(CandidateCore::example1(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let response = client
            .post("/voting")
            .header(ContentType::Form)
            .body(format!("candidate_id={candidate}"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/voting"));

        assert_eq!(receipts.count_documents(doc! {}, None).await.unwrap(), 1);
        let candidate_doc = candidates
            .find_one(candidate.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate_doc.votes, 1);
    }

    #[backend_test(voter)]
    async fn admin_pages_reject_a_voter_token(client: Client) {
        let response = client.get("/admin/stats").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/"));
    }
}
