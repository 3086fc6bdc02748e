//! Cached posts and their local annotations.

use booruvault_common::{Post, Rating, TagStats};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::str::FromStr;
use tracing::debug;

use super::{conversion_error, Database, LogFailure};
use crate::error::{Result, StoreError};

const POST_COLUMNS: &str = "id, source, directory, hash, width, height, owner, parent_id, rating, \
    sample, sample_width, sample_height, score, tags, file_url, created_at, image, \
    favorite, blacklisted, downloaded, view_count";

/// Remote fields are overwritten on conflict, local annotations are not.
const UPSERT_POST: &str = "INSERT INTO posts (id, source, directory, hash, width, height, owner, parent_id, rating,
        sample, sample_width, sample_height, score, tags, file_url, created_at, image,
        favorite, blacklisted, downloaded, view_count)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
    ON CONFLICT(id) DO UPDATE SET
        source = excluded.source,
        directory = excluded.directory,
        hash = excluded.hash,
        width = excluded.width,
        height = excluded.height,
        owner = excluded.owner,
        parent_id = excluded.parent_id,
        rating = excluded.rating,
        sample = excluded.sample,
        sample_width = excluded.sample_width,
        sample_height = excluded.sample_height,
        score = excluded.score,
        tags = excluded.tags,
        file_url = excluded.file_url,
        created_at = excluded.created_at,
        image = excluded.image";

const UPDATE_POST: &str = "UPDATE posts SET source = ?2, directory = ?3, hash = ?4, width = ?5, height = ?6,
        owner = ?7, parent_id = ?8, rating = ?9, sample = ?10, sample_width = ?11, sample_height = ?12,
        score = ?13, tags = ?14, file_url = ?15, created_at = ?16, image = ?17,
        favorite = ?18, blacklisted = ?19, downloaded = ?20, view_count = ?21
    WHERE id = ?1";

/// A local-only boolean annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Favorite,
    Blacklisted,
    Downloaded,
}

impl Flag {
    fn column(self) -> &'static str {
        match self {
            Flag::Favorite => "favorite",
            Flag::Blacklisted => "blacklisted",
            Flag::Downloaded => "downloaded",
        }
    }
}

/// Store for cached posts.
#[derive(Clone)]
pub struct PostStore {
    db: Database,
}

impl PostStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Merge a freshly fetched post into the cache.
    ///
    /// An existing record keeps its `favorite`, `blacklisted`, `downloaded`
    /// and view count. Read and write happen in one statement, so a
    /// concurrent writer cannot lose an update in between.
    pub fn upsert_post(&self, post: &Post) -> Result<Post> {
        self.db
            .transaction(|tx| upsert_in(tx, post))
            .log_failure("Upserting post")
    }

    /// Merge a page of freshly fetched posts into the cache.
    pub fn upsert_posts(&self, posts: &[Post]) -> Result<Vec<Post>> {
        let merged = self
            .db
            .transaction(|tx| posts.iter().map(|post| upsert_in(tx, post)).collect())
            .log_failure("Upserting posts")?;
        debug!("Merged {} posts into cache", posts.len());
        Ok(merged)
    }

    /// Overwrite a post, local flags included. Returns the affected row count.
    pub fn update_post(&self, post: &Post) -> Result<usize> {
        let mut post = post.clone();
        post.selected = false;

        self.db
            .transaction(|tx| {
                let rows = execute_post(tx, UPDATE_POST, &post)?;
                if rows > 0 {
                    replace_tags(tx, post.id, &post.tags)?;
                }
                Ok(rows)
            })
            .log_failure("Updating post")
    }

    /// Get a single post.
    pub fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.db.lock()?;
        select_post(&conn, id).log_failure("Loading post")
    }

    /// Get the posts with the given ids, in the order requested. Unknown ids are skipped.
    pub fn get_posts(&self, ids: &[i64]) -> Result<Vec<Post>> {
        let ids_json = serde_json::to_string(ids)?;
        let found = self.query(
            "WHERE id IN (SELECT value FROM json_each(?1))",
            params![ids_json],
        )?;

        let mut by_id: HashMap<i64, Post> = found.into_iter().map(|p| (p.id, p)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    pub fn get_favorite_posts(&self) -> Result<Vec<Post>> {
        self.query("WHERE favorite = 1 ORDER BY id", [])
            .log_failure("Loading favorite posts")
    }

    pub fn get_blacklisted_posts(&self) -> Result<Vec<Post>> {
        self.query("WHERE blacklisted = 1 ORDER BY id", [])
            .log_failure("Loading blacklisted posts")
    }

    pub fn get_downloaded_posts(&self) -> Result<Vec<Post>> {
        self.query("WHERE downloaded = 1 ORDER BY id", [])
            .log_failure("Loading downloaded posts")
    }

    pub fn get_posts_by_rating(&self, rating: Rating) -> Result<Vec<Post>> {
        self.query("WHERE rating = ?1 ORDER BY id", params![rating.as_ref()])
            .log_failure("Loading posts by rating")
    }

    /// Downloaded posts that carry every one of `tags`.
    pub fn get_posts_by_tags(&self, tags: &[String]) -> Result<Vec<Post>> {
        if tags.is_empty() {
            return Err(StoreError::InvalidArgument(
                "at least one tag is required".to_string(),
            ));
        }

        let mut candidates = Vec::with_capacity(tags.len());
        for tag in tags {
            let posts = self
                .query(
                    "WHERE downloaded = 1 AND id IN (SELECT post_id FROM post_tags WHERE tag = ?1) ORDER BY id",
                    params![tag],
                )
                .log_failure("Loading posts by tag")?;
            candidates.push(posts);
        }

        Ok(intersect_by_key(candidates, |post| post.id))
    }

    /// Number of cached posts carrying `tag`.
    pub fn count_posts_by_tag(&self, tag: &str) -> Result<u64> {
        let conn = self.db.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM post_tags WHERE tag = ?1",
                params![tag],
                |row| row.get(0),
            )
            .map_err(StoreError::from)
            .log_failure("Counting posts by tag")?;
        Ok(count as u64)
    }

    /// Number of cached posts.
    pub fn count_posts(&self) -> Result<u64> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Set one of the local annotations of a post.
    pub fn set_flag(&self, id: i64, flag: Flag, value: bool) -> Result<()> {
        let sql = format!("UPDATE posts SET {} = ?1 WHERE id = ?2", flag.column());

        let result = (|| {
            let conn = self.db.lock()?;
            let rows = conn.execute(&sql, params![value, id])?;
            if rows == 0 {
                return Err(StoreError::not_found("post", id));
            }
            Ok(())
        })();

        result.log_failure(&format!("Setting {} on post {}", flag.column(), id))
    }

    /// Bump the view counter of a post, returning the new value.
    pub fn increment_view_count(&self, id: i64) -> Result<u64> {
        let result = (|| {
            let conn = self.db.lock()?;
            let views: Option<i64> = conn
                .query_row(
                    "UPDATE posts SET view_count = view_count + 1 WHERE id = ?1 RETURNING view_count",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            views
                .map(|v| v as u64)
                .ok_or_else(|| StoreError::not_found("post", id))
        })();

        result.log_failure("Incrementing view count")
    }

    /// Favorite, blacklisted and downloaded counts over cached posts carrying `tag`.
    pub fn tag_statistics(&self, tag: &str) -> Result<TagStats> {
        let conn = self.db.lock()?;
        let stats = conn.query_row(
            "SELECT COALESCE(SUM(p.favorite), 0), COALESCE(SUM(p.blacklisted), 0), COALESCE(SUM(p.downloaded), 0)
             FROM posts p
             INNER JOIN post_tags t ON t.post_id = p.id
             WHERE t.tag = ?1",
            params![tag],
            |row| {
                Ok(TagStats {
                    favorite_count: row.get::<_, i64>(0)? as u64,
                    blacklisted_count: row.get::<_, i64>(1)? as u64,
                    downloaded_count: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;
        Ok(stats)
    }

    fn query(&self, clause: &str, params: impl rusqlite::Params) -> Result<Vec<Post>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM posts {}", POST_COLUMNS, clause))?;
        let posts = stmt
            .query_map(params, row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }
}

/// Intersect candidate lists by key.
///
/// The shortest list is walked first and its order is kept; the result holds
/// each key at most once.
pub fn intersect_by_key<T, K, F>(mut lists: Vec<Vec<T>>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    if lists.is_empty() {
        return Vec::new();
    }

    lists.sort_by_key(Vec::len);
    let mut lists = lists.into_iter();
    let shortest = lists.next().unwrap_or_default();
    let others: Vec<HashSet<K>> = lists
        .map(|list| list.iter().map(&key).collect())
        .collect();

    let mut seen = HashSet::new();
    shortest
        .into_iter()
        .filter(|item| {
            let k = key(item);
            others.iter().all(|set| set.contains(&k)) && seen.insert(k)
        })
        .collect()
}

fn upsert_in(conn: &Connection, post: &Post) -> Result<Post> {
    execute_post(conn, UPSERT_POST, post)?;
    replace_tags(conn, post.id, &post.tags)?;

    select_post(conn, post.id)?.ok_or_else(|| StoreError::not_found("post", post.id))
}

fn select_post(conn: &Connection, id: i64) -> Result<Option<Post>> {
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
            params![id],
            row_to_post,
        )
        .optional()?;
    Ok(post)
}

fn replace_tags(conn: &Connection, post_id: i64, tags: &[String]) -> Result<()> {
    conn.execute("DELETE FROM post_tags WHERE post_id = ?1", params![post_id])?;

    let mut stmt = conn.prepare_cached("INSERT OR IGNORE INTO post_tags (post_id, tag) VALUES (?1, ?2)")?;
    for tag in tags {
        stmt.execute(params![post_id, tag])?;
    }
    Ok(())
}

/// Execute an insert or update statement binding every post column as `?1..?21`.
fn execute_post(conn: &Connection, sql: &str, post: &Post) -> Result<usize> {
    let tags = serde_json::to_string(&post.tags)?;
    let rows = conn.execute(
        sql,
        params![
            post.id,
            post.source,
            post.directory,
            post.hash,
            post.width,
            post.height,
            post.owner,
            post.parent_id,
            post.rating.as_ref(),
            post.sample,
            post.sample_width,
            post.sample_height,
            post.score,
            tags,
            post.file_url,
            post.created_at,
            post.image,
            post.favorite,
            post.blacklisted,
            post.downloaded,
            post.view_count as i64,
        ],
    )?;
    Ok(rows)
}

fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    let rating: String = row.get(8)?;
    let rating = Rating::from_str(&rating).map_err(|e| conversion_error(8, e))?;
    let tags: String = row.get(13)?;
    let tags: Vec<String> = serde_json::from_str(&tags).map_err(|e| conversion_error(13, e))?;

    Ok(Post {
        id: row.get(0)?,
        source: row.get(1)?,
        directory: row.get(2)?,
        hash: row.get(3)?,
        width: row.get(4)?,
        height: row.get(5)?,
        owner: row.get(6)?,
        parent_id: row.get(7)?,
        rating,
        sample: row.get(9)?,
        sample_width: row.get(10)?,
        sample_height: row.get(11)?,
        score: row.get(12)?,
        tags,
        file_url: row.get(14)?,
        created_at: row.get(15)?,
        image: row.get(16)?,
        favorite: row.get(17)?,
        blacklisted: row.get(18)?,
        downloaded: row.get(19)?,
        selected: false,
        view_count: row.get::<_, i64>(20)? as u64,
    })
}

#[cfg(test)]
pub(crate) fn sample_post(id: i64, tags: &[&str]) -> Post {
    Post {
        id,
        source: String::new(),
        directory: "ab/cd".to_string(),
        hash: format!("hash{}", id),
        width: 1200,
        height: 800,
        owner: "uploader".to_string(),
        parent_id: None,
        rating: Rating::Safe,
        sample: true,
        sample_width: 850,
        sample_height: 566,
        score: 10,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        file_url: format!("https://img.example/images/ab/cd/{}.jpg", id),
        created_at: 1_654_362_000,
        image: format!("{}.jpg", id),
        favorite: false,
        blacklisted: false,
        downloaded: false,
        selected: false,
        view_count: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_stores;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_upsert_inserts_new_post() {
        let stores = test_stores();
        let mut post = sample_post(1, &["a", "b"]);
        post.selected = true;

        let stored = stores.posts.upsert_post(&post).unwrap();
        assert_eq!(stored.id, 1);
        assert_eq!(stored.tags, tags(&["a", "b"]));
        assert!(!stored.selected);
        assert_eq!(stores.posts.count_posts().unwrap(), 1);
    }

    #[test]
    fn test_upsert_preserves_local_flags() {
        let stores = test_stores();
        let mut post = sample_post(7, &["a"]);
        post.favorite = true;
        post.downloaded = true;
        stores.posts.upsert_post(&post).unwrap();
        stores.posts.increment_view_count(7).unwrap();

        // Fresh copy from the remote: new score and tags, no local state
        let mut fresh = sample_post(7, &["a", "c"]);
        fresh.score = 99;

        let merged = stores.posts.upsert_post(&fresh).unwrap();
        assert!(merged.favorite);
        assert!(merged.downloaded);
        assert!(!merged.blacklisted);
        assert_eq!(merged.view_count, 1);
        assert_eq!(merged.score, 99);
        assert_eq!(merged.tags, tags(&["a", "c"]));

        let stored = stores.posts.get_post(7).unwrap().unwrap();
        assert_eq!(stored, merged);
    }

    #[test]
    fn test_bulk_upsert_merges_each_post() {
        let stores = test_stores();
        let mut existing = sample_post(1, &["a"]);
        existing.blacklisted = true;
        stores.posts.upsert_post(&existing).unwrap();

        let page = vec![sample_post(1, &["a"]), sample_post(2, &["b"])];
        let merged = stores.posts.upsert_posts(&page).unwrap();

        assert_eq!(merged.len(), 2);
        assert!(merged[0].blacklisted);
        assert!(!merged[1].blacklisted);
    }

    #[test]
    fn test_update_post_overwrites_flags_and_clears_selection() {
        let stores = test_stores();
        stores.posts.upsert_post(&sample_post(3, &["a"])).unwrap();

        let mut post = sample_post(3, &["a", "b"]);
        post.favorite = true;
        post.selected = true;
        assert_eq!(stores.posts.update_post(&post).unwrap(), 1);

        let stored = stores.posts.get_post(3).unwrap().unwrap();
        assert!(stored.favorite);
        assert!(!stored.selected);
        assert_eq!(stores.posts.count_posts_by_tag("b").unwrap(), 1);

        // Unknown posts are not inserted
        assert_eq!(stores.posts.update_post(&sample_post(4, &[])).unwrap(), 0);
        assert!(stores.posts.get_post(4).unwrap().is_none());
    }

    #[test]
    fn test_posts_by_tags_intersects_downloaded_posts() {
        let stores = test_stores();
        let mut first = sample_post(1, &["a", "b"]);
        first.downloaded = true;
        let mut second = sample_post(2, &["a"]);
        second.downloaded = true;
        // Has both tags but was never downloaded
        let third = sample_post(3, &["a", "b"]);
        stores.posts.upsert_posts(&[first, second, third]).unwrap();

        let found = stores.posts.get_posts_by_tags(&tags(&["a", "b"])).unwrap();
        assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1]);

        let reversed = stores.posts.get_posts_by_tags(&tags(&["b", "a"])).unwrap();
        assert_eq!(reversed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1]);

        let single = stores.posts.get_posts_by_tags(&tags(&["a"])).unwrap();
        assert_eq!(single.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);

        assert!(stores.posts.get_posts_by_tags(&tags(&["missing"])).unwrap().is_empty());
    }

    #[test]
    fn test_posts_by_tags_requires_a_tag() {
        let stores = test_stores();
        let err = stores.posts.get_posts_by_tags(&[]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_intersect_keeps_shortest_order_and_dedups() {
        let lists = vec![vec![1, 2, 3, 4, 5], vec![4, 2, 2, 9], vec![5, 4, 3, 2]];
        assert_eq!(intersect_by_key(lists, |n| *n), vec![4, 2]);

        let empty: Vec<Vec<i32>> = Vec::new();
        assert!(intersect_by_key(empty, |n| *n).is_empty());
    }

    #[test]
    fn test_flags_and_queries() {
        let stores = test_stores();
        let mut explicit = sample_post(2, &["x"]);
        explicit.rating = Rating::Explicit;
        stores.posts.upsert_posts(&[sample_post(1, &["x"]), explicit]).unwrap();

        stores.posts.set_flag(1, Flag::Favorite, true).unwrap();
        stores.posts.set_flag(2, Flag::Blacklisted, true).unwrap();
        stores.posts.set_flag(2, Flag::Downloaded, true).unwrap();

        let favorites = stores.posts.get_favorite_posts().unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, 1);
        assert_eq!(stores.posts.get_blacklisted_posts().unwrap()[0].id, 2);
        assert_eq!(stores.posts.get_downloaded_posts().unwrap()[0].id, 2);
        assert_eq!(stores.posts.get_posts_by_rating(Rating::Explicit).unwrap()[0].id, 2);

        let stats = stores.posts.tag_statistics("x").unwrap();
        assert_eq!(
            stats,
            TagStats {
                favorite_count: 1,
                blacklisted_count: 1,
                downloaded_count: 1,
            }
        );
        assert_eq!(stores.posts.tag_statistics("unknown").unwrap(), TagStats::default());
    }

    #[test]
    fn test_flag_on_missing_post_is_not_found() {
        let stores = test_stores();
        let err = stores.posts.set_flag(404, Flag::Favorite, true).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(matches!(
            stores.posts.increment_view_count(404).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn test_get_posts_keeps_requested_order() {
        let stores = test_stores();
        stores
            .posts
            .upsert_posts(&[sample_post(1, &[]), sample_post(2, &[]), sample_post(3, &[])])
            .unwrap();

        let posts = stores.posts.get_posts(&[3, 99, 1]).unwrap();
        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![3, 1]);
        assert!(stores.posts.get_favorite_posts().unwrap().is_empty());
    }
}
