use rocket::{
    form::Form,
    request::FlashMessage,
    response::{Flash, Redirect},
    Route,
};
use rocket_dyn_templates::{context, Template};

use crate::error::Result;
use crate::model::{
    auth::{AdminUser, AuthToken},
    db::Setting,
    mongodb::Coll,
};

use super::PageContext;

pub fn routes() -> Vec<Route> {
    routes![edit_form, save]
}

#[get("/admin/settings")]
async fn edit_form(
    _token: AuthToken<AdminUser>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template> {
    let ctx = PageContext::load(&settings, flash).await?;
    Ok(Template::render("admin/settings", context! { ctx }))
}

#[derive(FromForm)]
struct SettingsForm {
    title: String,
    subtitle: String,
    org_name: String,
}

#[post("/admin/settings", data = "<form>")]
async fn save(
    _token: AuthToken<AdminUser>,
    form: Form<SettingsForm>,
    settings: Coll<Setting>,
) -> Result<Flash<Redirect>> {
    Setting::upsert(&settings, Setting::TITLE, &form.title).await?;
    Setting::upsert(&settings, Setting::SUBTITLE, &form.subtitle).await?;
    Setting::upsert(&settings, Setting::ORG_NAME, &form.org_name).await?;

    Ok(Flash::success(
        Redirect::to(uri!("/admin/settings")),
        "Pengaturan berhasil disimpan!",
    ))
}
