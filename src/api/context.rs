use mongodb::error::Error as DbError;
use rocket::request::FlashMessage;
use serde::Serialize;

use crate::model::{db::Setting, mongodb::Coll};

/// Per-request render context: the editable display settings plus any
/// one-shot flash message from the previous request. Rocket clears the
/// flash cookie once it has been read, so messages render exactly once.
#[derive(Debug, Serialize)]
pub struct PageContext {
    pub title: String,
    pub subtitle: String,
    pub org_name: String,
    pub flash_success: Option<String>,
    pub flash_error: Option<String>,
}

impl PageContext {
    pub async fn load(
        settings: &Coll<Setting>,
        flash: Option<FlashMessage<'_>>,
    ) -> Result<Self, DbError> {
        let title = Setting::get_or(settings, Setting::TITLE, Setting::DEFAULT_TITLE).await?;
        let subtitle =
            Setting::get_or(settings, Setting::SUBTITLE, Setting::DEFAULT_SUBTITLE).await?;
        let org_name =
            Setting::get_or(settings, Setting::ORG_NAME, Setting::DEFAULT_ORG_NAME).await?;

        let (flash_success, flash_error) = match flash {
            Some(flash) if flash.kind() == "success" => (Some(flash.message().to_string()), None),
            Some(flash) => (None, Some(flash.message().to_string())),
            None => (None, None),
        };

        Ok(Self {
            title,
            subtitle,
            org_name,
            flash_success,
            flash_error,
        })
    }
}
