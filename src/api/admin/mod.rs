use mongodb::bson::doc;
use rocket::{request::FlashMessage, Route};
use rocket_dyn_templates::{context, Template};

use crate::error::Result;
use crate::model::{
    auth::{AdminUser, AuthToken},
    db::{Account, Receipt, Setting},
    mongodb::Coll,
};

use super::PageContext;

mod candidates;
mod settings;
mod stats;
mod students;

pub fn routes() -> Vec<Route> {
    let mut routes = routes![dashboard];
    routes.extend(students::routes());
    routes.extend(candidates::routes());
    routes.extend(stats::routes());
    routes.extend(settings::routes());
    routes
}

#[get("/admin")]
async fn dashboard(
    _token: AuthToken<AdminUser>,
    accounts: Coll<Account>,
    receipts: Coll<Receipt>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template> {
    let total_voters = accounts
        .count_documents(doc! { "role": "voter" }, None)
        .await?;
    let total_voted = receipts.count_documents(None, None).await?;

    let ctx = PageContext::load(&settings, flash).await?;
    Ok(Template::render(
        "admin/dashboard",
        context! { ctx, total_voters, total_voted },
    ))
}
