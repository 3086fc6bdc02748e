//! Dispatch of IPC requests onto the stores.

use base64::Engine;
use booruvault_common::{ErrorCode, Request, Response};

use crate::api::{BooruClient, SearchQuery};
use crate::database::{Flag, Stores};
use crate::error::StoreError;
use crate::sync::{self, SyncError};
use crate::VERSION;

/// Everything a request may touch.
pub struct Context {
    pub stores: Stores,
    pub client: BooruClient,
}

fn store_response<T>(result: Result<T, StoreError>, f: impl FnOnce(T) -> Response) -> Response {
    match result {
        Ok(value) => f(value),
        Err(e) => Response::error(e.code(), e.to_string()),
    }
}

fn sync_response<T>(result: Result<T, SyncError>, f: impl FnOnce(T) -> Response) -> Response {
    match result {
        Ok(value) => f(value),
        Err(e) => Response::error(e.code(), e.to_string()),
    }
}

fn ok(_: ()) -> Response {
    Response::Ok
}

fn posts(posts: Vec<booruvault_common::Post>) -> Response {
    Response::Posts { posts }
}

/// Handle a single request.
pub async fn handle_request(ctx: &Context, request: Request) -> Response {
    let stores = &ctx.stores;

    match request {
        Request::UpsertPost { post } => {
            store_response(stores.posts.upsert_post(&post), |post| Response::Post { post })
        }

        Request::UpsertPosts { posts: page } => store_response(stores.posts.upsert_posts(&page), posts),

        Request::UpdatePost { post } => store_response(stores.posts.update_post(&post), |rows| {
            Response::Count { count: rows as u64 }
        }),

        Request::GetPost { id } => match stores.posts.get_post(id) {
            Ok(Some(post)) => Response::Post { post },
            Ok(None) => Response::error(ErrorCode::NotFound, format!("post {} not found", id)),
            Err(e) => Response::error(e.code(), e.to_string()),
        },

        Request::GetFavoritePosts => store_response(stores.posts.get_favorite_posts(), posts),

        Request::GetBlacklistedPosts => store_response(stores.posts.get_blacklisted_posts(), posts),

        Request::GetDownloadedPosts => store_response(stores.posts.get_downloaded_posts(), posts),

        Request::GetPostsByRating { rating } => {
            store_response(stores.posts.get_posts_by_rating(rating), posts)
        }

        Request::GetPostsByTags { tags } => store_response(stores.posts.get_posts_by_tags(&tags), posts),

        Request::CountPostsByTag { tag } => {
            store_response(stores.posts.count_posts_by_tag(&tag), |count| Response::Count { count })
        }

        Request::SetFavorite { id, value } => {
            store_response(stores.posts.set_flag(id, Flag::Favorite, value), ok)
        }

        Request::SetBlacklisted { id, value } => {
            store_response(stores.posts.set_flag(id, Flag::Blacklisted, value), ok)
        }

        Request::SetDownloaded { id, value } => {
            store_response(stores.posts.set_flag(id, Flag::Downloaded, value), ok)
        }

        Request::IncrementViewCount { id } => {
            store_response(stores.posts.increment_view_count(id), |count| Response::Count { count })
        }

        Request::GetTagStatistics { tag } => {
            store_response(stores.posts.tag_statistics(&tag), |stats| Response::TagStatistics { stats })
        }

        Request::UpsertTags { tags } => store_response(stores.tags.upsert_tags(&tags), ok),

        Request::GetTags {
            pattern,
            limit,
            offset,
        } => store_response(
            stores.tags.get_tags(pattern.as_deref(), limit, offset),
            |tags| Response::Tags { tags },
        ),

        Request::TagExists { tag } => {
            store_response(stores.tags.tag_exists(&tag), |exists| Response::Exists { exists })
        }

        Request::CreateSavedSearch {
            tags,
            excluded_tags,
            rating,
        } => store_response(
            stores.saved_searches.create(&tags, &excluded_tags, rating),
            |search| Response::SavedSearch { search },
        ),

        Request::GetSavedSearches => store_response(stores.saved_searches.get_all(), |searches| {
            Response::SavedSearches { searches }
        }),

        Request::GetSavedSearch { id } => {
            store_response(stores.saved_searches.get(id), |search| Response::SavedSearch { search })
        }

        Request::TouchSavedSearch { id } => store_response(stores.saved_searches.touch(id), ok),

        Request::DeleteSavedSearch { id } => store_response(stores.saved_searches.delete(id), ok),

        Request::AddSavedSearchPreview { id, thumbnail } => {
            match base64::engine::general_purpose::STANDARD.decode(&thumbnail) {
                Ok(bytes) => store_response(stores.saved_searches.add_preview(id, &bytes), |preview_id| {
                    Response::PreviewId { preview_id }
                }),
                Err(e) => Response::error(ErrorCode::InvalidRequest, format!("Invalid thumbnail: {}", e)),
            }
        }

        Request::RemoveSavedSearchPreview { id, preview_id } => {
            store_response(stores.saved_searches.remove_preview(id, preview_id), ok)
        }

        Request::GetMostSearchedTags { limit } => {
            store_response(stores.tag_history.most_searched(limit), |counts| Response::TagCounts { counts })
        }

        Request::GetSetting { key } => {
            store_response(stores.settings.get(&key), |value| Response::Setting { key, value })
        }

        Request::SetSetting { key, value } => store_response(stores.settings.set(&key, &value), ok),

        Request::DeleteSetting { key } => match stores.settings.delete(&key) {
            Ok(true) => Response::Ok,
            Ok(false) => Response::error(ErrorCode::NotFound, format!("setting {} not found", key)),
            Err(e) => Response::error(e.code(), e.to_string()),
        },

        Request::GetSettings => {
            store_response(stores.settings.all(), |settings| Response::Settings { settings })
        }

        Request::AddFavoritesNode { parent_key, title } => {
            store_response(stores.favorites.add_child(&parent_key, &title), |key| Response::NodeKey { key })
        }

        Request::DeleteFavoritesNode { key } => {
            store_response(stores.favorites.delete_node_and_children(&key), ok)
        }

        Request::GetFavoritesChildren { key } => {
            store_response(stores.favorites.get_children(&key), |nodes| Response::Nodes { nodes })
        }

        Request::GetFavoritesTree => {
            store_response(stores.favorites.get_tree(), |tree| Response::Tree { tree })
        }

        Request::GetFavoritesNode { key } => {
            store_response(stores.favorites.get_node(&key), |tree| Response::Tree { tree })
        }

        Request::AddPostToNode { key, post_id } => {
            store_response(stores.favorites.add_post(&key, post_id), ok)
        }

        Request::AddPostsToNode { key, post_ids } => {
            store_response(stores.favorites.add_posts(&key, &post_ids), |added| Response::Count {
                count: added as u64,
            })
        }

        Request::RemovePostFromNode { key, post_id } => {
            store_response(stores.favorites.remove_post(&key, post_id), ok)
        }

        Request::MovePost {
            from_key,
            to_key,
            post_id,
        } => store_response(stores.favorites.move_post(&from_key, &to_key, post_id), ok),

        Request::MoveFavoritesNode { key, new_parent_key } => store_response(
            stores.favorites.move_node(&key, &new_parent_key),
            |key| Response::NodeKey { key },
        ),

        Request::GetFavoritesKeys => {
            store_response(stores.favorites.get_all_keys(), |keys| Response::Keys { keys })
        }

        Request::GetFavoriteTags => {
            store_response(stores.favorites.get_all_favorite_tags(), |counts| Response::TagCounts { counts })
        }

        Request::GetFavoritePostIds => {
            store_response(stores.favorites.get_all_post_ids(), |post_ids| Response::PostIds { post_ids })
        }

        Request::SearchRemote {
            tags,
            page,
            limit,
            rating,
        } => {
            let query = SearchQuery {
                tags,
                page,
                limit,
                rating,
            };
            sync_response(sync::search_remote(&ctx.client, stores, &query).await, posts)
        }

        Request::SyncPostTags { id } => sync_response(
            sync::sync_post_tags(&ctx.client, stores, id).await,
            |tags| Response::Tags { tags },
        ),

        Request::RefreshTags { pattern } => sync_response(
            sync::refresh_tags(&ctx.client, stores, &pattern).await,
            |tags| Response::Tags { tags },
        ),

        Request::GetStatus => {
            let status = (|| -> Result<Response, StoreError> {
                Ok(Response::Status {
                    version: VERSION.to_string(),
                    post_count: stores.posts.count_posts()?,
                    tag_count: stores.tags.count_tags()?,
                    database_size_bytes: stores.db.database_size()?,
                })
            })();
            store_response(status, |response| response)
        }

        Request::Ping => Response::Pong,
    }
}
