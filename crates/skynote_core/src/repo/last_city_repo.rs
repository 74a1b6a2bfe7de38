//! Single-slot last-city repository.
//!
//! # Invariants
//! - At most one row exists in `last_city_table`; every upsert overwrites it.

use crate::model::note::{LastCity, LAST_CITY_SLOT_ID};
use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};

pub trait LastCityRepository {
    /// Overwrites the slot with `city`.
    fn upsert_last_city(&self, city: &str) -> RepoResult<()>;
    fn get_last_city(&self) -> RepoResult<Option<LastCity>>;
}

/// SQLite-backed last-city repository.
pub struct SqliteLastCityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLastCityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LastCityRepository for SqliteLastCityRepository<'_> {
    fn upsert_last_city(&self, city: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO last_city_table (id, city) VALUES (?1, ?2);",
            params![LAST_CITY_SLOT_ID, city],
        )?;
        Ok(())
    }

    fn get_last_city(&self) -> RepoResult<Option<LastCity>> {
        let city = self
            .conn
            .query_row(
                "SELECT id, city FROM last_city_table LIMIT 1;",
                [],
                |row| {
                    Ok(LastCity {
                        id: row.get("id")?,
                        city: row.get("city")?,
                    })
                },
            )
            .optional()?;
        Ok(city)
    }
}
