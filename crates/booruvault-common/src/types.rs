//! Core types shared between daemon and client.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Content rating of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Rating {
    Safe,
    Questionable,
    Explicit,
}

/// Category of a tag in the remote vocabulary.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TagType {
    Artist,
    Character,
    Copyright,
    Metadata,
    #[default]
    Tag,
}

/// A post mirrored from the remote API, annotated with local-only state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Remote identifier, also the local primary key.
    pub id: i64,
    #[serde(default)]
    pub source: String,
    /// Storage directory on the remote image server.
    #[serde(default)]
    pub directory: String,
    /// Content hash reported by the remote.
    #[serde(default)]
    pub hash: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub rating: Rating,
    #[serde(default)]
    pub sample: bool,
    #[serde(default)]
    pub sample_width: u32,
    #[serde(default)]
    pub sample_height: u32,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub file_url: String,
    /// Unix timestamp of remote creation.
    #[serde(default)]
    pub created_at: i64,
    /// File name on the remote image server.
    #[serde(default)]
    pub image: String,

    // Local-only annotations, never supplied by the remote.
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub blacklisted: bool,
    #[serde(default)]
    pub downloaded: bool,
    /// UI selection flag. Never persisted.
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub view_count: u64,
}

/// A tag known to the remote vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    /// Tag text, unique.
    pub tag: String,
    /// Remote usage count.
    #[serde(default)]
    pub count: u64,
    #[serde(default, rename = "type")]
    pub tag_type: TagType,
    #[serde(default)]
    pub ambiguous: bool,
}

/// Locally derived statistics for a tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStats {
    pub favorite_count: u64,
    pub blacklisted_count: u64,
    pub downloaded_count: u64,
}

/// A tag and how often it occurs in some collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// A thumbnail attached to a saved search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSearchPreview {
    pub id: i64,
    /// Raw image bytes, base64 encoded on the wire.
    #[serde(with = "base64_bytes")]
    pub thumbnail: Vec<u8>,
}

/// A persisted search definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSearch {
    pub id: i64,
    pub tags: Vec<String>,
    #[serde(default)]
    pub excluded_tags: Vec<String>,
    #[serde(default)]
    pub rating: Option<Rating>,
    /// Unix timestamp of the last time this search was run.
    #[serde(default)]
    pub last_searched: Option<i64>,
    #[serde(default)]
    pub previews: Vec<SavedSearchPreview>,
}

/// Key of the favorites tree root node.
pub const ROOT_KEY: &str = "root";

/// Separator between path segments of a favorites node key.
pub const KEY_SEPARATOR: char = '.';

/// One directory of the favorites tree, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Parent key and title joined by `.`, e.g. `root.Artists.Holo`.
    pub key: String,
    pub title: String,
    pub children_keys: Vec<String>,
    pub post_ids: Vec<i64>,
}

/// Strip the last `.segment` from a node key.
pub fn parent_key(key: &str) -> Option<&str> {
    key.rfind(KEY_SEPARATOR)
        .map(|idx| &key[..idx])
        .filter(|parent| !parent.is_empty())
}

/// Build the key of a child node.
pub fn child_key(parent_key: &str, title: &str) -> String {
    format!("{}{}{}", parent_key, KEY_SEPARATOR, title)
}

/// Recursive in-memory view of (part of) the favorites tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritesTree {
    pub key: String,
    pub title: String,
    pub post_ids: Vec<i64>,
    pub children: Vec<FavoritesTree>,
}

impl FavoritesTree {
    /// Shallow projection of a stored node.
    pub fn shallow(node: TreeNode) -> Self {
        Self {
            key: node.key,
            title: node.title,
            post_ids: node.post_ids,
            children: Vec::new(),
        }
    }

    /// Find a node anywhere in this subtree.
    pub fn find(&self, key: &str) -> Option<&FavoritesTree> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(key))
    }

    /// Number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(FavoritesTree::node_count).sum::<usize>()
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
