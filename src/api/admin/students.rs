use std::collections::HashMap;

use mongodb::bson::doc;
use rocket::{
    form::Form,
    futures::TryStreamExt,
    request::FlashMessage,
    response::{Flash, Redirect},
    Route,
};
use rocket_dyn_templates::{context, Template};
use serde::Serialize;

use crate::error::Result;
use crate::model::{
    auth::{AdminUser, AuthToken},
    db::{hash_password, Account, Candidate, NewAccount, Receipt, Role, Setting},
    mongodb::{is_duplicate_key_error, Coll, Id},
};
use crate::voting::remove_account;

use super::super::{public::PageOrRedirect, PageContext};

pub fn routes() -> Vec<Route> {
    routes![list, new_form, create, edit_form, update, delete, delete_fallback]
}

/// The template-facing slice of a student account.
#[derive(Serialize)]
struct StudentRow {
    id: String,
    name: String,
    username: String,
    has_voted: bool,
    voted_candidate: Option<String>,
}

#[get("/admin/students")]
async fn list(
    _token: AuthToken<AdminUser>,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template> {
    let students: Vec<Account> = accounts
        .find(doc! { "role": "voter" }, None)
        .await?
        .try_collect()
        .await?;

    // Resolve chosen-candidate references to names for display.
    let all_candidates: Vec<Candidate> = candidates.find(None, None).await?.try_collect().await?;
    let names_by_id: HashMap<Id, &str> = all_candidates
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();

    let rows: Vec<StudentRow> = students
        .iter()
        .map(|account| StudentRow {
            id: account.id.to_string(),
            name: account.name.clone(),
            username: account.username.clone(),
            has_voted: account.has_voted,
            voted_candidate: account
                .voted_candidate
                .and_then(|id| names_by_id.get(&id).map(|name| name.to_string())),
        })
        .collect();

    let ctx = PageContext::load(&settings, flash).await?;
    Ok(Template::render(
        "admin/students",
        context! { ctx, students: rows },
    ))
}

#[get("/admin/students/new")]
async fn new_form(
    _token: AuthToken<AdminUser>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template> {
    let ctx = PageContext::load(&settings, flash).await?;
    Ok(Template::render("admin/student_form", context! { ctx }))
}

#[derive(FromForm)]
struct StudentForm {
    name: String,
    username: String,
    password: String,
}

#[post("/admin/students", data = "<form>")]
async fn create(
    _token: AuthToken<AdminUser>,
    form: Form<StudentForm>,
    accounts: Coll<NewAccount>,
) -> Result<Flash<Redirect>> {
    let account = NewAccount::new(&form.name, &form.username, &form.password, Role::Voter)?;
    match accounts.insert_one(account, None).await {
        Ok(_) => Ok(Flash::success(
            Redirect::to(uri!("/admin/students")),
            "Mahasiswa berhasil ditambahkan",
        )),
        // The unique index on `username` rejected the insert.
        Err(err) if is_duplicate_key_error(&err) => Ok(Flash::error(
            Redirect::to(uri!("/admin/students/new")),
            "Username sudah digunakan",
        )),
        Err(err) => Err(err.into()),
    }
}

#[get("/admin/students/<id>/edit")]
async fn edit_form(
    _token: AuthToken<AdminUser>,
    id: Id,
    accounts: Coll<Account>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<PageOrRedirect> {
    let student = accounts
        .find_one(doc! { "_id": *id, "role": "voter" }, None)
        .await?;
    let student = match student {
        Some(student) => student,
        None => return Ok(PageOrRedirect::Redirect(Redirect::to(uri!("/admin/students")))),
    };

    let ctx = PageContext::load(&settings, flash).await?;
    Ok(PageOrRedirect::Page(Template::render(
        "admin/student_form",
        context! {
            ctx,
            student: StudentRow {
                id: student.id.to_string(),
                name: student.name.clone(),
                username: student.username.clone(),
                has_voted: student.has_voted,
                voted_candidate: None,
            },
        },
    )))
}

/// Update form: a blank password means "leave the password unchanged".
#[derive(FromForm)]
struct StudentUpdateForm {
    name: String,
    username: String,
    password: String,
}

#[put("/admin/students/<id>", data = "<form>")]
async fn update(
    _token: AuthToken<AdminUser>,
    id: Id,
    form: Form<StudentUpdateForm>,
    accounts: Coll<Account>,
) -> Result<Flash<Redirect>> {
    let student = accounts
        .find_one(doc! { "_id": *id, "role": "voter" }, None)
        .await?;
    if student.is_none() {
        return Ok(Flash::error(
            Redirect::to(uri!("/admin/students")),
            "Mahasiswa tidak ditemukan",
        ));
    }

    let mut update = doc! {
        "name": &form.name,
        "username": form.username.to_lowercase(),
    };
    if !form.password.is_empty() {
        update.insert("password_hash", hash_password(&form.password)?);
    }

    match accounts
        .update_one(id.as_doc(), doc! { "$set": update }, None)
        .await
    {
        Ok(_) => Ok(Flash::success(
            Redirect::to(uri!("/admin/students")),
            "Data mahasiswa berhasil diperbarui",
        )),
        Err(err) if is_duplicate_key_error(&err) => Ok(Flash::error(
            Redirect::to(format!("/admin/students/{id}/edit")),
            "Username sudah digunakan",
        )),
        Err(err) => Err(err.into()),
    }
}

#[delete("/admin/students/<id>")]
async fn delete(
    _token: AuthToken<AdminUser>,
    id: Id,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    receipts: Coll<Receipt>,
) -> Result<Flash<Redirect>> {
    remove_student(id, accounts, candidates, receipts).await
}

/// POST fallback for clients that cannot send DELETE from an HTML form.
#[post("/admin/students/<id>/delete")]
async fn delete_fallback(
    _token: AuthToken<AdminUser>,
    id: Id,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    receipts: Coll<Receipt>,
) -> Result<Flash<Redirect>> {
    remove_student(id, accounts, candidates, receipts).await
}

async fn remove_student(
    id: Id,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    receipts: Coll<Receipt>,
) -> Result<Flash<Redirect>> {
    let back = Redirect::to(uri!("/admin/students"));

    // Only voter accounts are managed here; admins are not deletable
    // through this surface.
    let student = accounts
        .find_one(doc! { "_id": *id, "role": "voter" }, None)
        .await?;
    if student.is_none() {
        return Ok(Flash::error(back, "Mahasiswa tidak ditemukan"));
    }

    remove_account(&accounts, &candidates, &receipts, id).await?;
    Ok(Flash::success(back, "Mahasiswa berhasil dihapus"))
}
