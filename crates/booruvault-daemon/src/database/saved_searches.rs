//! Saved search definitions and their preview thumbnails.

use booruvault_common::{Rating, SavedSearch, SavedSearchPreview};
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use tracing::info;

use super::{conversion_error, unix_now, Database, LogFailure};
use crate::error::{Result, StoreError};

/// Store for saved searches.
#[derive(Clone)]
pub struct SavedSearchStore {
    db: Database,
}

impl SavedSearchStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a saved search, or return the one with the same terms.
    ///
    /// Tags are sorted and deduplicated first, so `a b` and `b a` are the
    /// same search.
    pub fn create(
        &self,
        tags: &[String],
        excluded_tags: &[String],
        rating: Option<Rating>,
    ) -> Result<SavedSearch> {
        let tags = canonical(tags);
        let excluded_tags = canonical(excluded_tags);
        if tags.is_empty() {
            return Err(StoreError::InvalidArgument(
                "a saved search needs at least one tag".to_string(),
            ));
        }

        let tags_json = serde_json::to_string(&tags)?;
        let excluded_json = serde_json::to_string(&excluded_tags)?;
        let rating = rating.map(|r| r.to_string()).unwrap_or_default();

        self.db
            .transaction(|tx| {
                let inserted = tx.execute(
                    "INSERT INTO saved_searches (tags, excluded_tags, rating) VALUES (?1, ?2, ?3)
                     ON CONFLICT(tags, excluded_tags, rating) DO NOTHING",
                    params![tags_json, excluded_json, rating],
                )?;

                let id: i64 = tx.query_row(
                    "SELECT id FROM saved_searches WHERE tags = ?1 AND excluded_tags = ?2 AND rating = ?3",
                    params![tags_json, excluded_json, rating],
                    |row| row.get(0),
                )?;

                if inserted > 0 {
                    info!("Created saved search {} ({})", id, tags.join(" "));
                }
                load(tx, id)
            })
            .log_failure("Creating saved search")
    }

    pub fn get(&self, id: i64) -> Result<SavedSearch> {
        let conn = self.db.lock()?;
        load(&conn, id)
    }

    /// All saved searches, most recently searched first.
    pub fn get_all(&self) -> Result<Vec<SavedSearch>> {
        let conn = self.db.lock()?;
        let ids: Vec<i64> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM saved_searches ORDER BY last_searched DESC NULLS LAST, id DESC",
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };

        ids.into_iter().map(|id| load(&conn, id)).collect()
    }

    /// Mark a saved search as just run.
    pub fn touch(&self, id: i64) -> Result<()> {
        let result = self.db.lock().and_then(|conn| {
            let rows = conn.execute(
                "UPDATE saved_searches SET last_searched = ?1 WHERE id = ?2",
                params![unix_now(), id],
            )?;
            if rows == 0 {
                return Err(StoreError::not_found("saved search", id));
            }
            Ok(())
        });
        result.log_failure("Touching saved search")
    }

    /// Delete a saved search together with its previews.
    pub fn delete(&self, id: i64) -> Result<()> {
        let result = self.db.lock().and_then(|conn| {
            let rows = conn.execute("DELETE FROM saved_searches WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(StoreError::not_found("saved search", id));
            }
            Ok(())
        });
        result.log_failure("Deleting saved search")
    }

    /// Attach a thumbnail to a saved search, returning the preview id.
    pub fn add_preview(&self, id: i64, thumbnail: &[u8]) -> Result<i64> {
        self.db
            .transaction(|tx| {
                if !exists(tx, id)? {
                    return Err(StoreError::not_found("saved search", id));
                }
                tx.execute(
                    "INSERT INTO saved_search_previews (search_id, thumbnail) VALUES (?1, ?2)",
                    params![id, thumbnail],
                )?;
                Ok(tx.last_insert_rowid())
            })
            .log_failure("Adding saved search preview")
    }

    pub fn remove_preview(&self, id: i64, preview_id: i64) -> Result<()> {
        let result = self.db.lock().and_then(|conn| {
            let rows = conn.execute(
                "DELETE FROM saved_search_previews WHERE id = ?1 AND search_id = ?2",
                params![preview_id, id],
            )?;
            if rows == 0 {
                return Err(StoreError::not_found("saved search preview", preview_id));
            }
            Ok(())
        });
        result.log_failure("Removing saved search preview")
    }
}

fn canonical(tags: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

fn exists(conn: &Connection, id: i64) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM saved_searches WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn load(conn: &Connection, id: i64) -> Result<SavedSearch> {
    let row: Option<(String, String, String, Option<i64>)> = conn
        .query_row(
            "SELECT tags, excluded_tags, rating, last_searched FROM saved_searches WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;
    let (tags, excluded_tags, rating, last_searched) =
        row.ok_or_else(|| StoreError::not_found("saved search", id))?;

    let rating = if rating.is_empty() {
        None
    } else {
        Some(Rating::from_str(&rating).map_err(|e| conversion_error(2, e))?)
    };

    let mut stmt = conn.prepare_cached(
        "SELECT id, thumbnail FROM saved_search_previews WHERE search_id = ?1 ORDER BY id",
    )?;
    let previews = stmt
        .query_map(params![id], |row| {
            Ok(SavedSearchPreview {
                id: row.get(0)?,
                thumbnail: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(SavedSearch {
        id,
        tags: serde_json::from_str(&tags)?,
        excluded_tags: serde_json::from_str(&excluded_tags)?,
        rating,
        last_searched,
        previews,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_stores;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_create_or_reuse() {
        let stores = test_stores();
        let first = stores
            .saved_searches
            .create(&strings(&["b", "a"]), &strings(&["c"]), Some(Rating::Safe))
            .unwrap();
        assert_eq!(first.tags, strings(&["a", "b"]));
        assert_eq!(first.rating, Some(Rating::Safe));

        let again = stores
            .saved_searches
            .create(&strings(&["a", "b", "a"]), &strings(&["c"]), Some(Rating::Safe))
            .unwrap();
        assert_eq!(again.id, first.id);

        let other = stores
            .saved_searches
            .create(&strings(&["a", "b"]), &strings(&["c"]), None)
            .unwrap();
        assert_ne!(other.id, first.id);
        assert_eq!(stores.saved_searches.get_all().unwrap().len(), 2);
    }

    #[test]
    fn test_create_requires_tags() {
        let stores = test_stores();
        let err = stores.saved_searches.create(&[], &[], None).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_previews_and_delete() {
        let stores = test_stores();
        let search = stores
            .saved_searches
            .create(&strings(&["a"]), &[], None)
            .unwrap();

        let first = stores.saved_searches.add_preview(search.id, &[1, 2, 3]).unwrap();
        let second = stores.saved_searches.add_preview(search.id, &[4]).unwrap();
        stores.saved_searches.remove_preview(search.id, first).unwrap();

        let loaded = stores.saved_searches.get(search.id).unwrap();
        assert_eq!(loaded.previews.len(), 1);
        assert_eq!(loaded.previews[0].id, second);
        assert_eq!(loaded.previews[0].thumbnail, vec![4]);

        assert!(matches!(
            stores.saved_searches.remove_preview(search.id, first).unwrap_err(),
            StoreError::NotFound { .. }
        ));

        stores.saved_searches.delete(search.id).unwrap();
        assert!(matches!(
            stores.saved_searches.get(search.id).unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            stores.saved_searches.add_preview(search.id, &[1]).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn test_touch_orders_by_last_searched() {
        let stores = test_stores();
        let older = stores.saved_searches.create(&strings(&["a"]), &[], None).unwrap();
        let newer = stores.saved_searches.create(&strings(&["b"]), &[], None).unwrap();

        stores.saved_searches.touch(older.id).unwrap();

        let all = stores.saved_searches.get_all().unwrap();
        assert_eq!(all[0].id, older.id);
        assert!(all[0].last_searched.is_some());
        assert_eq!(all[1].id, newer.id);
        assert!(stores.saved_searches.touch(999).is_err());
    }
}
