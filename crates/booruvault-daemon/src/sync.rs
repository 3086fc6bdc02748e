//! Remote fetches merged into the local cache.

use booruvault_common::{ErrorCode, Post, Tag};
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{ApiError, BooruClient, SearchQuery};
use crate::database::{unix_now, Stores};
use crate::error::StoreError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SyncError::Api(_) => ErrorCode::RemoteError,
            SyncError::Store(e) => e.code(),
        }
    }
}

/// Fetch a page of posts and merge it into the cache.
///
/// Local annotations of already cached posts survive, the searched tags are
/// recorded in the search history, and blacklisted posts are left out of
/// the returned page.
pub async fn search_remote(
    client: &BooruClient,
    stores: &Stores,
    query: &SearchQuery,
) -> Result<Vec<Post>, SyncError> {
    let fetched = client.search_posts(query).await?;
    let merged = stores.posts.upsert_posts(&fetched)?;
    stores.tag_history.record(&query.tags, unix_now())?;

    let before = merged.len();
    let visible: Vec<Post> = merged.into_iter().filter(|p| !p.blacklisted).collect();
    if visible.len() < before {
        debug!("Hid {} blacklisted posts", before - visible.len());
    }
    Ok(visible)
}

/// Cache the tags of a post that are not cached yet.
///
/// Returns the tags that were fetched and saved.
pub async fn sync_post_tags(
    client: &BooruClient,
    stores: &Stores,
    post_id: i64,
) -> Result<Vec<Tag>, SyncError> {
    let post = stores
        .posts
        .get_post(post_id)?
        .ok_or_else(|| StoreError::not_found("post", post_id))?;

    let missing = stores.tags.missing_tags(&post.tags)?;
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let mut found = Vec::with_capacity(missing.len());
    for name in &missing {
        match client.get_tag(name).await? {
            Some(tag) => found.push(tag),
            None => debug!("Tag {} is unknown to the remote", name),
        }
    }

    stores.tags.upsert_tags(&found)?;
    info!(
        "Cached {} of {} missing tags for post {}",
        found.len(),
        missing.len(),
        post_id
    );
    Ok(found)
}

/// Look tags up remotely and cache them.
pub async fn refresh_tags(
    client: &BooruClient,
    stores: &Stores,
    pattern: &str,
) -> Result<Vec<Tag>, SyncError> {
    let tags = client.search_tags(pattern, None).await?;
    stores.tags.upsert_tags(&tags)?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::database::test_stores;
    use booruvault_common::{Rating, TagType};

    fn offline_client() -> BooruClient {
        // Nothing listens here; tests below must not reach the network
        let config = ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..ApiConfig::default()
        };
        BooruClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_sync_skips_cached_tags() {
        let stores = test_stores();
        let post = Post {
            id: 1,
            source: String::new(),
            directory: String::new(),
            hash: String::new(),
            width: 1,
            height: 1,
            owner: String::new(),
            parent_id: None,
            rating: Rating::Safe,
            sample: false,
            sample_width: 0,
            sample_height: 0,
            score: 0,
            tags: vec!["cached".to_string()],
            file_url: String::new(),
            created_at: 0,
            image: String::new(),
            favorite: false,
            blacklisted: false,
            downloaded: false,
            selected: false,
            view_count: 0,
        };
        stores.posts.upsert_post(&post).unwrap();
        stores
            .tags
            .upsert_tag(&Tag {
                id: 1,
                tag: "cached".to_string(),
                count: 1,
                tag_type: TagType::Tag,
                ambiguous: false,
            })
            .unwrap();

        let fetched = sync_post_tags(&offline_client(), &stores, 1).await.unwrap();
        assert!(fetched.is_empty());
    }

    #[tokio::test]
    async fn test_sync_unknown_post() {
        let stores = test_stores();
        let err = sync_post_tags(&offline_client(), &stores, 404).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_remote_error() {
        let stores = test_stores();
        let query = SearchQuery {
            tags: vec!["a".to_string()],
            ..SearchQuery::default()
        };

        let err = search_remote(&offline_client(), &stores, &query).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RemoteError);
        // Nothing was recorded for a failed search
        assert!(stores.tag_history.most_searched(None).unwrap().is_empty());
    }
}
