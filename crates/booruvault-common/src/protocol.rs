//! IPC protocol types for communication between daemon and client.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{
    FavoritesTree, Post, Rating, SavedSearch, Tag, TagCount, TagStats, TreeNode,
};

/// Request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Merge a freshly fetched post into the cache.
    UpsertPost { post: Post },

    /// Merge a page of freshly fetched posts into the cache.
    UpsertPosts { posts: Vec<Post> },

    /// Overwrite a post, local flags included.
    UpdatePost { post: Post },

    GetPost { id: i64 },

    GetFavoritePosts,

    GetBlacklistedPosts,

    GetDownloadedPosts,

    GetPostsByRating { rating: Rating },

    /// Downloaded posts carrying every one of the given tags.
    GetPostsByTags { tags: Vec<String> },

    CountPostsByTag { tag: String },

    SetFavorite { id: i64, value: bool },

    SetBlacklisted { id: i64, value: bool },

    SetDownloaded { id: i64, value: bool },

    IncrementViewCount { id: i64 },

    GetTagStatistics { tag: String },

    UpsertTags { tags: Vec<Tag> },

    /// List cached tags.
    GetTags {
        /// Case-sensitive substring filter.
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        offset: Option<u32>,
    },

    TagExists { tag: String },

    /// Create a saved search, or return the existing one with the same terms.
    CreateSavedSearch {
        tags: Vec<String>,
        #[serde(default)]
        excluded_tags: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rating: Option<Rating>,
    },

    GetSavedSearches,

    GetSavedSearch { id: i64 },

    TouchSavedSearch { id: i64 },

    DeleteSavedSearch { id: i64 },

    AddSavedSearchPreview {
        id: i64,
        /// Thumbnail bytes (base64 encoded).
        thumbnail: String,
    },

    RemoveSavedSearchPreview { id: i64, preview_id: i64 },

    GetMostSearchedTags {
        #[serde(skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },

    GetSetting { key: String },

    SetSetting { key: String, value: serde_json::Value },

    DeleteSetting { key: String },

    GetSettings,

    /// Create a favorites directory under a parent.
    AddFavoritesNode { parent_key: String, title: String },

    /// Delete a favorites directory and everything below it.
    DeleteFavoritesNode { key: String },

    GetFavoritesChildren { key: String },

    GetFavoritesTree,

    /// A single directory without its children.
    GetFavoritesNode { key: String },

    AddPostToNode { key: String, post_id: i64 },

    AddPostsToNode { key: String, post_ids: Vec<i64> },

    RemovePostFromNode { key: String, post_id: i64 },

    MovePost {
        from_key: String,
        to_key: String,
        post_id: i64,
    },

    MoveFavoritesNode { key: String, new_parent_key: String },

    GetFavoritesKeys,

    GetFavoriteTags,

    GetFavoritePostIds,

    /// Run a search against the remote API and merge the results.
    SearchRemote {
        tags: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rating: Option<Rating>,
    },

    /// Fetch the tags of a cached post that are not cached yet.
    SyncPostTags { id: i64 },

    /// Look tags up remotely and cache them.
    RefreshTags { pattern: String },

    /// Get daemon status.
    GetStatus,

    /// Ping to check if daemon is alive.
    Ping,
}

/// Response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Post { post: Post },

    Posts { posts: Vec<Post> },

    /// A row count or a counter value.
    Count { count: u64 },

    Tags { tags: Vec<Tag> },

    Exists { exists: bool },

    TagStatistics { stats: TagStats },

    TagCounts { counts: Vec<TagCount> },

    SavedSearch { search: SavedSearch },

    SavedSearches { searches: Vec<SavedSearch> },

    PreviewId { preview_id: i64 },

    Setting {
        key: String,
        value: Option<serde_json::Value>,
    },

    Settings {
        settings: BTreeMap<String, serde_json::Value>,
    },

    /// Key of a created or moved favorites directory.
    NodeKey { key: String },

    Nodes { nodes: Vec<TreeNode> },

    Tree { tree: FavoritesTree },

    Keys { keys: Vec<String> },

    PostIds { post_ids: Vec<i64> },

    /// Generic success response.
    Ok,

    /// Error response.
    Error {
        /// Error code.
        code: ErrorCode,
        /// Human-readable error message.
        message: String,
    },

    /// Daemon status.
    Status {
        /// Daemon version.
        version: String,
        post_count: u64,
        tag_count: u64,
        /// Database size in bytes.
        database_size_bytes: u64,
    },

    /// Pong response to ping.
    Pong,
}

/// Error codes for error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Referenced post, tag, node or saved search does not exist.
    NotFound,
    /// A favorites node lists a child that does not exist.
    IntegrityViolation,
    /// The item is already present.
    Duplicate,
    /// Database error.
    DatabaseError,
    /// Remote API call failed.
    RemoteError,
    /// Invalid request.
    InvalidRequest,
    /// Internal error.
    InternalError,
}

impl Response {
    /// Create an error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

/// Encode a request to JSON bytes with newline delimiter.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, serde_json::Error> {
    let mut json = serde_json::to_vec(request)?;
    json.push(b'\n');
    Ok(json)
}

/// Encode a response to JSON bytes with newline delimiter.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, serde_json::Error> {
    let mut json = serde_json::to_vec(response)?;
    json.push(b'\n');
    Ok(json)
}

/// Decode a request from JSON bytes.
pub fn decode_request(data: &[u8]) -> Result<Request, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Decode a response from JSON bytes.
pub fn decode_response(data: &[u8]) -> Result<Response, serde_json::Error> {
    serde_json::from_slice(data)
}
