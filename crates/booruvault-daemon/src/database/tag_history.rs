//! Append-only log of searched tags.

use booruvault_common::TagCount;
use rusqlite::params;

use super::{Database, LogFailure};
use crate::error::Result;

#[derive(Clone)]
pub struct TagHistoryStore {
    db: Database,
}

impl TagHistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record one search of each tag in `tags`.
    pub fn record(&self, tags: &[String], searched_at: i64) -> Result<()> {
        self.db
            .transaction(|tx| {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO tag_search_history (tag, searched_at) VALUES (?1, ?2)",
                )?;
                for tag in tags {
                    stmt.execute(params![tag, searched_at])?;
                }
                Ok(())
            })
            .log_failure("Recording tag search history")
    }

    /// Tags by number of searches, most searched first.
    pub fn most_searched(&self, limit: Option<u32>) -> Result<Vec<TagCount>> {
        let limit = limit.map(i64::from).unwrap_or(-1);

        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT tag, COUNT(*) AS searches
             FROM tag_search_history
             GROUP BY tag
             ORDER BY searches DESC, tag ASC
             LIMIT ?1",
        )?;

        let counts = stmt
            .query_map(params![limit], |row| {
                Ok(TagCount {
                    tag: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }
}
