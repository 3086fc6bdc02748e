//! Cached tag vocabulary.

use booruvault_common::{Tag, TagType};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashSet;
use std::str::FromStr;

use super::{conversion_error, Database, LogFailure};
use crate::error::Result;

const TAG_COLUMNS: &str = "id, tag, count, tag_type, ambiguous";

/// Store for cached tags.
#[derive(Clone)]
pub struct TagStore {
    db: Database,
}

impl TagStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[cfg(test)]
    pub fn upsert_tag(&self, tag: &Tag) -> Result<()> {
        self.upsert_tags(std::slice::from_ref(tag))
    }

    /// Insert or overwrite tags. A row sharing the id or the text is replaced.
    pub fn upsert_tags(&self, tags: &[Tag]) -> Result<()> {
        self.db
            .transaction(|tx| {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO tags (id, tag, count, tag_type, ambiguous)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for tag in tags {
                    stmt.execute(params![
                        tag.id,
                        tag.tag,
                        tag.count as i64,
                        tag.tag_type.as_ref(),
                        tag.ambiguous
                    ])?;
                }
                Ok(())
            })
            .log_failure("Upserting tags")
    }

    /// List tags, optionally filtered by a case-sensitive substring.
    ///
    /// Most used tags come first.
    pub fn get_tags(
        &self,
        pattern: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Tag>> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let offset = offset.map(i64::from).unwrap_or(0);

        let conn = self.db.lock()?;
        // instr() is case-sensitive, LIKE is not
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tags
             WHERE ?1 IS NULL OR instr(tag, ?1) > 0
             ORDER BY count DESC, tag ASC
             LIMIT ?2 OFFSET ?3",
            TAG_COLUMNS
        ))?;

        let tags = stmt
            .query_map(params![pattern, limit, offset], row_to_tag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Look a tag up by its exact text.
    #[cfg(test)]
    pub fn get_tag(&self, text: &str) -> Result<Option<Tag>> {
        let conn = self.db.lock()?;
        let tag = conn
            .query_row(
                &format!("SELECT {} FROM tags WHERE tag = ?1", TAG_COLUMNS),
                params![text],
                row_to_tag,
            )
            .optional()?;
        Ok(tag)
    }

    pub fn tag_exists(&self, text: &str) -> Result<bool> {
        let conn = self.db.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tags WHERE tag = ?1)",
            params![text],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// The texts from `texts` that are not cached, first occurrence order.
    pub fn missing_tags(&self, texts: &[String]) -> Result<Vec<String>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare_cached("SELECT EXISTS(SELECT 1 FROM tags WHERE tag = ?1)")?;

        let mut seen = HashSet::new();
        let mut missing = Vec::new();
        for text in texts {
            if !seen.insert(text.as_str()) {
                continue;
            }
            let exists: bool = stmt.query_row(params![text], |row| row.get(0))?;
            if !exists {
                missing.push(text.clone());
            }
        }
        Ok(missing)
    }

    pub fn count_tags(&self) -> Result<u64> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_tag(row: &Row) -> rusqlite::Result<Tag> {
    let tag_type: String = row.get(3)?;
    let tag_type = TagType::from_str(&tag_type).map_err(|e| conversion_error(3, e))?;

    Ok(Tag {
        id: row.get(0)?,
        tag: row.get(1)?,
        count: row.get::<_, i64>(2)? as u64,
        tag_type,
        ambiguous: row.get(4)?,
    })
}
