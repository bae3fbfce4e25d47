use mongodb::{bson::doc, error::Error as DbError, options::UpdateOptions};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Coll;

/// A key-value pair of election display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

impl Setting {
    pub const TITLE: &'static str = "title";
    pub const SUBTITLE: &'static str = "subtitle";
    pub const ORG_NAME: &'static str = "org_name";

    pub const DEFAULT_TITLE: &'static str = "E-Pemira";
    pub const DEFAULT_SUBTITLE: &'static str = "Pemilihan Raya Ketua BEM Periode 2026/2027";
    pub const DEFAULT_ORG_NAME: &'static str = "BEM";

    /// Look up a setting, falling back to the given default.
    pub async fn get_or(
        settings: &Coll<Setting>,
        key: &str,
        default: &str,
    ) -> Result<String, DbError> {
        let setting = settings.find_one(doc! { "key": key }, None).await?;
        Ok(setting.map_or_else(|| default.to_string(), |s| s.value))
    }

    /// Insert or overwrite a setting.
    pub async fn upsert(settings: &Coll<Setting>, key: &str, value: &str) -> Result<(), DbError> {
        let options = UpdateOptions::builder().upsert(true).build();
        settings
            .update_one(
                doc! { "key": key },
                doc! { "$set": { "value": value } },
                options,
            )
            .await?;
        Ok(())
    }
}

/// Ensure the three display settings exist, writing defaults for any that
/// are missing. Idempotent; never overwrites an admin-edited value.
pub async fn ensure_default_settings(settings: &Coll<Setting>) -> Result<(), DbError> {
    for (key, default) in [
        (Setting::TITLE, Setting::DEFAULT_TITLE),
        (Setting::SUBTITLE, Setting::DEFAULT_SUBTITLE),
        (Setting::ORG_NAME, Setting::DEFAULT_ORG_NAME),
    ] {
        let options = UpdateOptions::builder().upsert(true).build();
        settings
            .update_one(
                doc! { "key": key },
                doc! { "$setOnInsert": { "value": default } },
                options,
            )
            .await?;
    }
    Ok(())
}
