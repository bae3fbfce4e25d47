use mongodb::{bson::doc, options::FindOptions};
use rocket::{
    futures::TryStreamExt,
    request::FlashMessage,
    response::{Flash, Redirect},
    Route,
};
use rocket_dyn_templates::{context, Template};
use serde::Serialize;

use crate::error::Result;
use crate::export::{Report, XlsxDownload};
use crate::model::{
    auth::{AdminUser, AuthToken},
    db::{Account, Candidate, Receipt, Setting},
    mongodb::Coll,
};
use crate::voting::reset_election;

use super::PageContext;

pub fn routes() -> Vec<Route> {
    routes![stats, export_excel, reset_data]
}

/// The template-facing slice of a tally.
#[derive(Serialize)]
struct TallyRow {
    number: u32,
    name: String,
    votes: u64,
}

#[get("/admin/stats")]
async fn stats(
    _token: AuthToken<AdminUser>,
    candidates: Coll<Candidate>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template> {
    let by_number = FindOptions::builder().sort(doc! { "number": 1 }).build();
    let all: Vec<Candidate> = candidates.find(None, by_number).await?.try_collect().await?;
    let rows: Vec<TallyRow> = all
        .iter()
        .map(|c| TallyRow {
            number: c.number,
            name: c.name.clone(),
            votes: c.votes,
        })
        .collect();

    let ctx = PageContext::load(&settings, flash).await?;
    Ok(Template::render(
        "admin/stats",
        context! { ctx, candidates: rows },
    ))
}

#[derive(Responder)]
enum ExportResult {
    File(XlsxDownload),
    Failed(Flash<Redirect>),
}

#[get("/admin/export-excel")]
async fn export_excel(
    _token: AuthToken<AdminUser>,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    receipts: Coll<Receipt>,
    settings: Coll<Setting>,
) -> ExportResult {
    let result = async {
        let org_name =
            Setting::get_or(&settings, Setting::ORG_NAME, Setting::DEFAULT_ORG_NAME).await?;
        let subtitle =
            Setting::get_or(&settings, Setting::SUBTITLE, Setting::DEFAULT_SUBTITLE).await?;
        let report = Report::load(org_name, subtitle, &accounts, &candidates, &receipts).await?;
        let bytes = report
            .to_xlsx()
            .map_err(|err| format!("spreadsheet serialisation failed: {err}"))?;
        Ok::<_, Box<dyn std::error::Error + Send + Sync>>(XlsxDownload {
            filename: report.filename(),
            bytes,
        })
    }
    .await;

    match result {
        Ok(download) => ExportResult::File(download),
        Err(err) => {
            error!("Export failed: {err}");
            ExportResult::Failed(Flash::error(
                Redirect::to(uri!("/admin/stats")),
                "Gagal export data",
            ))
        }
    }
}

#[post("/admin/reset-data")]
async fn reset_data(
    _token: AuthToken<AdminUser>,
    accounts: Coll<Account>,
    candidates: Coll<Candidate>,
    receipts: Coll<Receipt>,
) -> Flash<Redirect> {
    let back = Redirect::to(uri!("/admin/stats"));
    match reset_election(&accounts, &candidates, &receipts).await {
        Ok(()) => Flash::success(back, "Data voting berhasil direset!"),
        Err(err) => {
            error!("Reset failed: {err}");
            Flash::error(back, "Gagal reset data, silakan coba lagi")
        }
    }
}
