use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions};
use rocket::{
    form::Form,
    fs::TempFile,
    futures::TryStreamExt,
    request::FlashMessage,
    response::{Flash, Redirect},
    Route, State,
};
use rocket_dyn_templates::{context, Template};

use crate::error::Result;
use crate::model::{
    auth::{AdminUser, AuthToken},
    db::{Account, Candidate, NewCandidate, Receipt, Setting},
    mongodb::{is_duplicate_key_error, Coll, Id},
};
use crate::voting::remove_candidate;
use crate::Config;

use super::super::{
    public::PageOrRedirect,
    voting::{candidate_card, CandidateCard},
    PageContext,
};

pub fn routes() -> Vec<Route> {
    routes![
        list,
        new_form,
        create,
        edit_form,
        update,
        update_fallback,
        delete,
        delete_fallback,
    ]
}

#[get("/admin/candidates")]
async fn list(
    _token: AuthToken<AdminUser>,
    candidates: Coll<Candidate>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template> {
    let by_number = FindOptions::builder().sort(doc! { "number": 1 }).build();
    let all: Vec<Candidate> = candidates.find(None, by_number).await?.try_collect().await?;
    let cards: Vec<CandidateCard> = all.iter().map(candidate_card).collect();

    let ctx = PageContext::load(&settings, flash).await?;
    Ok(Template::render(
        "admin/candidates",
        context! { ctx, candidates: cards },
    ))
}

#[get("/admin/candidates/new")]
async fn new_form(
    _token: AuthToken<AdminUser>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template> {
    let ctx = PageContext::load(&settings, flash).await?;
    Ok(Template::render("admin/candidate_form", context! { ctx }))
}

#[derive(FromForm)]
struct CandidateForm<'r> {
    number: u32,
    name: String,
    vision: String,
    mission: String,
    photo: Option<TempFile<'r>>,
}

#[post("/admin/candidates", data = "<form>")]
async fn create(
    _token: AuthToken<AdminUser>,
    mut form: Form<CandidateForm<'_>>,
    candidates: Coll<NewCandidate>,
    config: &State<Config>,
) -> Result<Flash<Redirect>> {
    let photo_path = store_photo(form.photo.as_mut(), config).await?;
    let candidate = NewCandidate::new(
        form.number,
        &form.name,
        &form.vision,
        &form.mission,
        photo_path,
    );

    match candidates.insert_one(candidate, None).await {
        Ok(_) => Ok(Flash::success(
            Redirect::to(uri!("/admin/candidates")),
            "Kandidat berhasil ditambahkan",
        )),
        // The unique index on `number` rejected the insert.
        Err(err) if is_duplicate_key_error(&err) => Ok(Flash::error(
            Redirect::to(uri!("/admin/candidates/new")),
            "Nomor urut sudah digunakan",
        )),
        Err(err) => Err(err.into()),
    }
}

#[get("/admin/candidates/<id>/edit")]
async fn edit_form(
    _token: AuthToken<AdminUser>,
    id: Id,
    candidates: Coll<Candidate>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<PageOrRedirect> {
    let candidate = match candidates.find_one(id.as_doc(), None).await? {
        Some(candidate) => candidate,
        None => {
            return Ok(PageOrRedirect::Redirect(Redirect::to(uri!(
                "/admin/candidates"
            ))))
        }
    };

    let ctx = PageContext::load(&settings, flash).await?;
    Ok(PageOrRedirect::Page(Template::render(
        "admin/candidate_form",
        context! { ctx, candidate: candidate_card(&candidate) },
    )))
}

#[put("/admin/candidates/<id>", data = "<form>")]
async fn update(
    _token: AuthToken<AdminUser>,
    id: Id,
    form: Form<CandidateForm<'_>>,
    candidates: Coll<Candidate>,
    config: &State<Config>,
) -> Result<Flash<Redirect>> {
    apply_update(id, form, candidates, config).await
}

/// POST fallback for clients that cannot send PUT from an HTML form.
#[post("/admin/candidates/<id>", data = "<form>")]
async fn update_fallback(
    _token: AuthToken<AdminUser>,
    id: Id,
    form: Form<CandidateForm<'_>>,
    candidates: Coll<Candidate>,
    config: &State<Config>,
) -> Result<Flash<Redirect>> {
    apply_update(id, form, candidates, config).await
}

async fn apply_update(
    id: Id,
    mut form: Form<CandidateForm<'_>>,
    candidates: Coll<Candidate>,
    config: &Config,
) -> Result<Flash<Redirect>> {
    let back = Redirect::to(uri!("/admin/candidates"));
    if candidates.find_one(id.as_doc(), None).await?.is_none() {
        return Ok(Flash::error(back, "Kandidat tidak ditemukan"));
    }

    let mut update = doc! {
        "number": form.number,
        "name": &form.name,
        "vision": &form.vision,
        "mission": &form.mission,
    };
    // No new upload means the existing photo is kept.
    if let Some(photo_path) = store_photo(form.photo.as_mut(), config).await? {
        update.insert("photo_path", photo_path);
    }

    match candidates
        .update_one(id.as_doc(), doc! { "$set": update }, None)
        .await
    {
        Ok(_) => Ok(Flash::success(back, "Data kandidat berhasil diperbarui")),
        Err(err) if is_duplicate_key_error(&err) => Ok(Flash::error(
            Redirect::to(format!("/admin/candidates/{id}/edit")),
            "Nomor urut sudah digunakan",
        )),
        Err(err) => Err(err.into()),
    }
}

#[delete("/admin/candidates/<id>")]
async fn delete(
    _token: AuthToken<AdminUser>,
    id: Id,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    receipts: Coll<Receipt>,
) -> Result<Flash<Redirect>> {
    apply_delete(id, accounts, candidates, receipts).await
}

/// POST fallback for clients that cannot send DELETE from an HTML form.
#[post("/admin/candidates/<id>/delete")]
async fn delete_fallback(
    _token: AuthToken<AdminUser>,
    id: Id,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    receipts: Coll<Receipt>,
) -> Result<Flash<Redirect>> {
    apply_delete(id, accounts, candidates, receipts).await
}

async fn apply_delete(
    id: Id,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    receipts: Coll<Receipt>,
) -> Result<Flash<Redirect>> {
    remove_candidate(&accounts, &candidates, &receipts, id).await?;
    Ok(Flash::success(
        Redirect::to(uri!("/admin/candidates")),
        "Kandidat berhasil dihapus",
    ))
}

/// Persist an uploaded photo under the configured uploads directory and
/// return its public path. An absent or empty upload yields `None`.
async fn store_photo(
    photo: Option<&mut TempFile<'_>>,
    config: &Config,
) -> Result<Option<String>> {
    let photo = match photo {
        Some(photo) if photo.len() > 0 => photo,
        _ => return Ok(None),
    };

    let stem = photo.name().unwrap_or("photo");
    let ext = photo
        .content_type()
        .and_then(|ct| ct.extension())
        .map(|ext| ext.as_str().to_string())
        .unwrap_or_else(|| "bin".to_string());
    let filename = format!("{}-{}.{}", Utc::now().timestamp_millis(), stem, ext);

    photo
        .copy_to(config.upload_dir().join(&filename))
        .await?;
    Ok(Some(format!("/uploads/{filename}")))
}
