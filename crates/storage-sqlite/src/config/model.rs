use diesel::prelude::*;

use crate::errors::StorageError;
use crate::utils::decode_timestamp;
use quotewarden_core::calendar::ConfigEntry;

#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::app_config)]
#[diesel(primary_key(config_type, config_key))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AppConfigDB {
    pub config_type: String,
    pub config_key: String,
    pub value: String,
    pub expires_at: Option<String>,
    pub updated_at: String,
}

impl TryFrom<AppConfigDB> for ConfigEntry {
    type Error = StorageError;

    fn try_from(row: AppConfigDB) -> Result<Self, Self::Error> {
        let expires_at = row
            .expires_at
            .as_deref()
            .map(|raw| decode_timestamp("expires_at", raw))
            .transpose()?;
        Ok(ConfigEntry {
            config_type: row.config_type,
            config_key: row.config_key,
            value: row.value,
            expires_at,
        })
    }
}
