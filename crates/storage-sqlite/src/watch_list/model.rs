use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use quotewarden_core::prices::WatchListEntry;

#[derive(
    Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq,
    Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::watch_list)]
#[diesel(primary_key(symbol))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct WatchListDB {
    pub symbol: String,
    pub priority: i32,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<WatchListDB> for WatchListEntry {
    fn from(row: WatchListDB) -> Self {
        WatchListEntry {
            symbol: row.symbol,
            priority: row.priority,
            enabled: row.enabled,
        }
    }
}
