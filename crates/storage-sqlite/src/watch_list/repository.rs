use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;

use super::model::WatchListDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::watch_list::dsl::*;
use crate::utils::encode_timestamp;
use quotewarden_core::prices::{WatchListEntry, WatchListStore};
use quotewarden_core::Result;

pub struct WatchListRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl WatchListRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        WatchListRepository { pool, writer }
    }
}

#[async_trait]
impl WatchListStore for WatchListRepository {
    fn list_enabled(&self) -> Result<Vec<WatchListEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = watch_list
            .filter(enabled.eq(true))
            .order((priority.asc(), symbol.asc()))
            .select(WatchListDB::as_select())
            .load::<WatchListDB>(&mut conn)
            .into_core()?;

        Ok(rows.into_iter().map(WatchListEntry::from).collect())
    }

    async fn upsert_entry(&self, entry: &WatchListEntry) -> Result<()> {
        let now = encode_timestamp(Utc::now());
        let row = WatchListDB {
            symbol: entry.symbol.clone(),
            priority: entry.priority,
            enabled: entry.enabled,
            created_at: now.clone(),
            updated_at: now,
        };

        self.writer
            .exec(move |conn| -> Result<()> {
                diesel::insert_into(watch_list)
                    .values(&row)
                    .on_conflict(symbol)
                    .do_update()
                    .set((
                        priority.eq(row.priority),
                        enabled.eq(row.enabled),
                        updated_at.eq(&row.updated_at),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }
}
