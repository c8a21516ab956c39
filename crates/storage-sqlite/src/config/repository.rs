use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;

use super::model::AppConfigDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::app_config::dsl as config_dsl;
use crate::utils::encode_timestamp;
use quotewarden_core::calendar::{ConfigEntry, ConfigStore};
use quotewarden_core::Result;

pub struct ConfigRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ConfigRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ConfigStore for ConfigRepository {
    fn get_config(&self, config_type: &str, config_key: &str) -> Result<Option<ConfigEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let row = config_dsl::app_config
            .find((config_type, config_key))
            .select(AppConfigDB::as_select())
            .first::<AppConfigDB>(&mut conn)
            .optional()
            .into_core()?;

        Ok(row.map(ConfigEntry::try_from).transpose()?)
    }

    async fn put_config(&self, entry: &ConfigEntry) -> Result<()> {
        let row = AppConfigDB {
            config_type: entry.config_type.clone(),
            config_key: entry.config_key.clone(),
            value: entry.value.clone(),
            expires_at: entry.expires_at.map(encode_timestamp),
            updated_at: encode_timestamp(Utc::now()),
        };

        self.writer
            .exec(move |conn| -> Result<()> {
                diesel::replace_into(config_dsl::app_config)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }
}
