//! Hierarchical favorites directories.
//!
//! Nodes are flat rows keyed by their path (`root.Artists.Holo`); the key of
//! a node's parent is its own key minus the last `.segment`. Every mutation
//! runs in one transaction, so a failed check leaves the tree untouched.

use booruvault_common::{child_key, parent_key, FavoritesTree, TagCount, TreeNode, ROOT_KEY, KEY_SEPARATOR};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use super::{Database, LogFailure, PostStore};
use crate::error::{Result, StoreError};

const NODE: &str = "favorites node";

/// Store for the favorites tree.
#[derive(Clone)]
pub struct FavoritesStore {
    db: Database,
    posts: PostStore,
}

impl FavoritesStore {
    pub fn new(db: Database, posts: PostStore) -> Self {
        Self { db, posts }
    }

    /// Create a directory named `title` under `parent_key`, returning its key.
    pub fn add_child(&self, parent_key: &str, title: &str) -> Result<String> {
        validate_title(title)?;

        self.db
            .transaction(|tx| {
                let mut parent = require_node(tx, parent_key)?;
                let key = child_key(parent_key, title);
                if load_node(tx, &key)?.is_some() {
                    return Err(StoreError::Duplicate(format!(
                        "{} already has a child named {}",
                        parent_key, title
                    )));
                }

                parent.children_keys.push(key.clone());
                let node = TreeNode {
                    key: key.clone(),
                    title: title.to_string(),
                    children_keys: Vec::new(),
                    post_ids: Vec::new(),
                };
                save_node(tx, &node)?;
                save_node(tx, &parent)?;

                info!("Created favorites directory {}", key);
                Ok(key)
            })
            .log_failure("Adding favorites directory")
    }

    /// Delete a directory and everything below it.
    ///
    /// The root has no parent segment and is therefore never deletable.
    pub fn delete_node_and_children(&self, key: &str) -> Result<()> {
        self.db
            .transaction(|tx| {
                let parent_key = parent_key(key).ok_or_else(|| StoreError::not_found("parent of", key))?;
                let mut parent = require_node(tx, parent_key)?;

                parent.children_keys.retain(|k| k != key);
                save_node(tx, &parent)?;

                let node = require_node(tx, key)?;
                let deleted = delete_subtree(tx, node)?;
                info!("Deleted favorites directory {} ({} nodes)", key, deleted);
                Ok(())
            })
            .log_failure("Deleting favorites directory")
    }

    /// Direct children of a directory.
    pub fn get_children(&self, key: &str) -> Result<Vec<TreeNode>> {
        let result = self.db.lock().and_then(|conn| {
            let node = require_node(&conn, key)?;
            node.children_keys
                .iter()
                .map(|child| require_child(&conn, &node.key, child))
                .collect()
        });
        result.log_failure("Loading favorites children")
    }

    /// The whole tree, expanded from the root.
    pub fn get_tree(&self) -> Result<FavoritesTree> {
        let result = self.db.lock().and_then(|conn| {
            let root = require_node(&conn, ROOT_KEY)?;
            expand(&conn, root)
        });
        result.log_failure("Loading favorites tree")
    }

    /// A single directory without its children.
    pub fn get_node(&self, key: &str) -> Result<FavoritesTree> {
        let result = self
            .db
            .lock()
            .and_then(|conn| require_node(&conn, key))
            .map(FavoritesTree::shallow);
        result.log_failure("Loading favorites directory")
    }

    /// Add a post to a directory. Adding a post twice is an error.
    pub fn add_post(&self, key: &str, post_id: i64) -> Result<()> {
        self.db
            .transaction(|tx| {
                let mut node = require_node(tx, key)?;
                if node.post_ids.contains(&post_id) {
                    return Err(StoreError::Duplicate(format!(
                        "post {} is already in {}",
                        post_id, key
                    )));
                }
                node.post_ids.push(post_id);
                save_node(tx, &node)
            })
            .log_failure("Adding post to favorites directory")
    }

    /// Add posts to a directory, skipping ids it already holds.
    ///
    /// Returns how many ids were appended.
    pub fn add_posts(&self, key: &str, post_ids: &[i64]) -> Result<usize> {
        self.db
            .transaction(|tx| {
                let mut node = require_node(tx, key)?;
                let before = node.post_ids.len();
                for id in post_ids {
                    if !node.post_ids.contains(id) {
                        node.post_ids.push(*id);
                    }
                }

                let added = node.post_ids.len() - before;
                if added > 0 {
                    save_node(tx, &node)?;
                }
                Ok(added)
            })
            .log_failure("Adding posts to favorites directory")
    }

    /// Remove a post from a directory. Removing an absent post is a no-op.
    pub fn remove_post(&self, key: &str, post_id: i64) -> Result<()> {
        self.db
            .transaction(|tx| {
                let mut node = require_node(tx, key)?;
                let before = node.post_ids.len();
                node.post_ids.retain(|id| *id != post_id);
                if node.post_ids.len() != before {
                    save_node(tx, &node)?;
                }
                Ok(())
            })
            .log_failure("Removing post from favorites directory")
    }

    /// Move a post from one directory to another.
    pub fn move_post(&self, from_key: &str, to_key: &str, post_id: i64) -> Result<()> {
        self.db
            .transaction(|tx| {
                let mut from = require_node(tx, from_key)?;
                let mut to = require_node(tx, to_key)?;

                if !from.post_ids.contains(&post_id) {
                    return Err(StoreError::not_found("post in favorites directory", post_id));
                }
                if to.post_ids.contains(&post_id) {
                    return Err(StoreError::Duplicate(format!(
                        "post {} is already in {}",
                        post_id, to_key
                    )));
                }

                from.post_ids.retain(|id| *id != post_id);
                to.post_ids.push(post_id);
                save_node(tx, &from)?;
                save_node(tx, &to)
            })
            .log_failure("Moving post between favorites directories")
    }

    /// Move a directory under a new parent, returning its new key.
    ///
    /// Keys encode the path, so the directory and all its descendants are
    /// rekeyed.
    pub fn move_node(&self, key: &str, new_parent_key: &str) -> Result<String> {
        let result = (|| {
            let old_parent_key = parent_key(key)
                .ok_or_else(|| StoreError::InvalidArgument(format!("{} cannot be moved", key)))?;
            if is_same_or_descendant(new_parent_key, key) {
                return Err(StoreError::InvalidArgument(format!(
                    "cannot move {} into its own subtree",
                    key
                )));
            }

            self.db.transaction(|tx| {
                let node = require_node(tx, key)?;
                if old_parent_key == new_parent_key {
                    return Ok(key.to_string());
                }

                let mut old_parent = require_node(tx, old_parent_key)?;
                let mut new_parent = require_node(tx, new_parent_key)?;

                let new_key = child_key(new_parent_key, &node.title);
                if load_node(tx, &new_key)?.is_some() {
                    return Err(StoreError::Duplicate(format!(
                        "{} already has a child named {}",
                        new_parent_key, node.title
                    )));
                }

                let subtree = load_subtree(tx, key)?;
                for old in &subtree {
                    tx.execute("DELETE FROM favorites_tree WHERE key = ?1", params![old.key])?;
                }
                for old in subtree {
                    let moved = TreeNode {
                        key: rekey(&old.key, key, &new_key),
                        title: old.title,
                        children_keys: old
                            .children_keys
                            .iter()
                            .map(|child| rekey(child, key, &new_key))
                            .collect(),
                        post_ids: old.post_ids,
                    };
                    save_node(tx, &moved)?;
                }

                old_parent.children_keys.retain(|k| k != key);
                new_parent.children_keys.push(new_key.clone());
                save_node(tx, &old_parent)?;
                save_node(tx, &new_parent)?;

                info!("Moved favorites directory {} to {}", key, new_key);
                Ok(new_key)
            })
        })();

        result.log_failure("Moving favorites directory")
    }

    /// Every node key, sorted.
    pub fn get_all_keys(&self) -> Result<Vec<String>> {
        let result = self.db.lock().and_then(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM favorites_tree ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        });
        result.log_failure("Loading favorites keys")
    }

    /// Every post id held anywhere in the tree, each once.
    pub fn get_all_post_ids(&self) -> Result<Vec<i64>> {
        let result = self.db.lock().and_then(|conn| {
            let mut stmt = conn.prepare("SELECT post_ids FROM favorites_tree ORDER BY key")?;
            let lists = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut seen = HashSet::new();
            let mut ids = Vec::new();
            for list in lists {
                let list: Vec<i64> = serde_json::from_str(&list)?;
                ids.extend(list.into_iter().filter(|id| seen.insert(*id)));
            }
            Ok(ids)
        });
        result.log_failure("Loading favorite post ids")
    }

    /// How often each tag occurs among the favorited posts.
    ///
    /// Posts that are not in the cache are skipped.
    pub fn get_all_favorite_tags(&self) -> Result<Vec<TagCount>> {
        self.favorite_tag_counts()
            .log_failure("Counting favorite tags")
    }

    fn favorite_tag_counts(&self) -> Result<Vec<TagCount>> {
        let ids = self.get_all_post_ids()?;
        let posts = self.posts.get_posts(&ids)?;
        if posts.len() < ids.len() {
            warn!(
                "{} favorited posts are not cached, skipping them in tag counts",
                ids.len() - posts.len()
            );
        }

        let mut counts: HashMap<String, u64> = HashMap::new();
        for tag in posts.into_iter().flat_map(|post| post.tags) {
            *counts.entry(tag).or_default() += 1;
        }

        let mut counts: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        Ok(counts)
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(StoreError::InvalidArgument(
            "directory title must not be empty".to_string(),
        ));
    }
    if title.contains(KEY_SEPARATOR) {
        return Err(StoreError::InvalidArgument(format!(
            "directory title must not contain '{}'",
            KEY_SEPARATOR
        )));
    }
    Ok(())
}

/// `candidate` equals `key` or lies below it.
fn is_same_or_descendant(candidate: &str, key: &str) -> bool {
    candidate == key
        || (candidate.starts_with(key) && candidate[key.len()..].starts_with(KEY_SEPARATOR))
}

/// Replace the `old_prefix` of a subtree key by `new_prefix`.
fn rekey(key: &str, old_prefix: &str, new_prefix: &str) -> String {
    format!("{}{}", new_prefix, &key[old_prefix.len()..])
}

fn load_node(conn: &Connection, key: &str) -> Result<Option<TreeNode>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT title, children_keys, post_ids FROM favorites_tree WHERE key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match row {
        Some((title, children_keys, post_ids)) => Ok(Some(TreeNode {
            key: key.to_string(),
            title,
            children_keys: serde_json::from_str(&children_keys)?,
            post_ids: serde_json::from_str(&post_ids)?,
        })),
        None => Ok(None),
    }
}

fn require_node(conn: &Connection, key: &str) -> Result<TreeNode> {
    load_node(conn, key)?.ok_or_else(|| StoreError::not_found(NODE, key))
}

/// Resolve a key listed in a parent's children.
fn require_child(conn: &Connection, parent: &str, key: &str) -> Result<TreeNode> {
    if parent_key(key) != Some(parent) {
        return Err(StoreError::Integrity(format!(
            "{} lists {} as a child",
            parent, key
        )));
    }
    load_node(conn, key)?.ok_or_else(|| {
        StoreError::Integrity(format!("{} lists missing child {}", parent, key))
    })
}

fn save_node(conn: &Connection, node: &TreeNode) -> Result<()> {
    conn.execute(
        "INSERT INTO favorites_tree (key, title, children_keys, post_ids) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(key) DO UPDATE SET
            title = excluded.title,
            children_keys = excluded.children_keys,
            post_ids = excluded.post_ids",
        params![
            node.key,
            node.title,
            serde_json::to_string(&node.children_keys)?,
            serde_json::to_string(&node.post_ids)?
        ],
    )?;
    Ok(())
}

/// Recursively build the in-memory view below `node`.
fn expand(conn: &Connection, node: TreeNode) -> Result<FavoritesTree> {
    let children = node
        .children_keys
        .iter()
        .map(|child| require_child(conn, &node.key, child).and_then(|c| expand(conn, c)))
        .collect::<Result<Vec<_>>>()?;

    Ok(FavoritesTree {
        key: node.key,
        title: node.title,
        post_ids: node.post_ids,
        children,
    })
}

/// Delete `node` after all of its descendants, returning the number of nodes removed.
fn delete_subtree(conn: &Connection, node: TreeNode) -> Result<usize> {
    let mut deleted = 0;
    for child in &node.children_keys {
        deleted += delete_subtree(conn, require_child(conn, &node.key, child)?)?;
    }

    conn.execute("DELETE FROM favorites_tree WHERE key = ?1", params![node.key])?;
    Ok(deleted + 1)
}

/// `key` and every node below it.
fn load_subtree(conn: &Connection, key: &str) -> Result<Vec<TreeNode>> {
    let prefix = format!("{}{}", key, KEY_SEPARATOR);
    let keys: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT key FROM favorites_tree
             WHERE key = ?1 OR substr(key, 1, length(?2)) = ?2
             ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![key, prefix], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        keys
    };

    keys.iter().map(|k| require_node(conn, k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::posts::sample_post;
    use crate::database::test_stores;

    #[test]
    fn test_add_child_builds_key_from_parent() {
        let stores = test_stores();
        let key = stores.favorites.add_child(ROOT_KEY, "X").unwrap();
        assert_eq!(key, "root.X");

        let children = stores.favorites.get_children(ROOT_KEY).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].key, "root.X");
        assert_eq!(children[0].title, "X");

        let nested = stores.favorites.add_child("root.X", "Y").unwrap();
        assert_eq!(nested, "root.X.Y");
    }

    #[test]
    fn test_add_child_rejects_missing_parent_and_collisions() {
        let stores = test_stores();

        let err = stores.favorites.add_child("root.nope", "X").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(stores.favorites.get_all_keys().unwrap(), vec!["root"]);

        stores.favorites.add_child(ROOT_KEY, "X").unwrap();
        let err = stores.favorites.add_child(ROOT_KEY, "X").unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(stores.favorites.get_children(ROOT_KEY).unwrap().len(), 1);

        assert!(matches!(
            stores.favorites.add_child(ROOT_KEY, "a.b").unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
        assert!(matches!(
            stores.favorites.add_child(ROOT_KEY, " ").unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_delete_removes_descendants() {
        let stores = test_stores();
        let a = stores.favorites.add_child(ROOT_KEY, "A").unwrap();
        let b = stores.favorites.add_child(&a, "B").unwrap();
        stores.favorites.add_child(&b, "C").unwrap();
        stores.favorites.add_child(ROOT_KEY, "D").unwrap();

        stores.favorites.delete_node_and_children(&a).unwrap();

        assert_eq!(stores.favorites.get_all_keys().unwrap(), vec!["root", "root.D"]);
        let root = stores.favorites.get_node(ROOT_KEY).unwrap();
        assert_eq!(root.key, "root");
        let children = stores.favorites.get_children(ROOT_KEY).unwrap();
        assert_eq!(children.iter().map(|c| c.key.as_str()).collect::<Vec<_>>(), vec!["root.D"]);
    }

    #[test]
    fn test_delete_rejects_root_and_unknown() {
        let stores = test_stores();
        assert!(matches!(
            stores.favorites.delete_node_and_children(ROOT_KEY).unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            stores.favorites.delete_node_and_children("root.ghost").unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            stores.favorites.delete_node_and_children("other.ghost").unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert_eq!(stores.favorites.get_all_keys().unwrap(), vec!["root"]);
    }

    #[test]
    fn test_failed_delete_leaves_tree_untouched() {
        let stores = test_stores();
        let a = stores.favorites.add_child(ROOT_KEY, "A").unwrap();
        let b = stores.favorites.add_child(&a, "B").unwrap();
        {
            let conn = stores.db.lock().unwrap();
            conn.execute(
                "UPDATE favorites_tree SET children_keys = '[\"root.A.B.lost\"]' WHERE key = 'root.A.B'",
                [],
            )
            .unwrap();
        }

        assert!(matches!(
            stores.favorites.delete_node_and_children(&a).unwrap_err(),
            StoreError::Integrity(_)
        ));

        let children = stores.favorites.get_children(ROOT_KEY).unwrap();
        assert_eq!(children.iter().map(|c| c.key.as_str()).collect::<Vec<_>>(), vec![a.as_str()]);
        assert_eq!(
            stores.favorites.get_all_keys().unwrap(),
            vec!["root".to_string(), a, b]
        );
    }

    #[test]
    fn test_self_listed_child_does_not_recurse() {
        let stores = test_stores();
        let a = stores.favorites.add_child(ROOT_KEY, "A").unwrap();
        {
            let conn = stores.db.lock().unwrap();
            conn.execute(
                "UPDATE favorites_tree SET children_keys = '[\"root.A\", \"root\"]' WHERE key = 'root.A'",
                [],
            )
            .unwrap();
        }

        assert!(matches!(
            stores.favorites.delete_node_and_children(&a).unwrap_err(),
            StoreError::Integrity(_)
        ));
        assert_eq!(stores.favorites.get_all_keys().unwrap(), vec!["root".to_string(), a]);
    }

    #[test]
    fn test_get_tree() {
        let stores = test_stores();
        let a = stores.favorites.add_child(ROOT_KEY, "A").unwrap();
        let b = stores.favorites.add_child(&a, "B").unwrap();
        stores.favorites.add_child(ROOT_KEY, "C").unwrap();
        stores.favorites.add_post(&b, 5).unwrap();

        let tree = stores.favorites.get_tree().unwrap();
        assert_eq!(tree.key, "root");
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.children[0].key, "root.A");
        assert_eq!(tree.children[1].key, "root.C");
        assert_eq!(tree.find("root.A.B").unwrap().post_ids, vec![5]);

        let shallow = stores.favorites.get_node(&a).unwrap();
        assert!(shallow.children.is_empty());
        assert!(stores.favorites.get_node("root.Z").is_err());
    }

    #[test]
    fn test_dangling_child_is_integrity_violation() {
        let stores = test_stores();
        {
            let conn = stores.db.lock().unwrap();
            conn.execute(
                "UPDATE favorites_tree SET children_keys = '[\"root.lost\"]' WHERE key = 'root'",
                [],
            )
            .unwrap();
        }

        assert!(matches!(
            stores.favorites.get_children(ROOT_KEY).unwrap_err(),
            StoreError::Integrity(_)
        ));
        assert!(matches!(
            stores.favorites.get_tree().unwrap_err(),
            StoreError::Integrity(_)
        ));
    }

    #[test]
    fn test_single_add_rejects_duplicates_bulk_add_filters() {
        let stores = test_stores();
        let key = stores.favorites.add_child(ROOT_KEY, "Pics").unwrap();

        stores.favorites.add_post(&key, 1).unwrap();
        assert!(matches!(
            stores.favorites.add_post(&key, 1).unwrap_err(),
            StoreError::Duplicate(_)
        ));

        let added = stores.favorites.add_posts(&key, &[1, 1, 2]).unwrap();
        assert_eq!(added, 1);
        assert_eq!(stores.favorites.get_node(&key).unwrap().post_ids, vec![1, 2]);

        assert!(matches!(
            stores.favorites.add_posts("root.none", &[1]).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let stores = test_stores();
        let key = stores.favorites.add_child(ROOT_KEY, "Pics").unwrap();
        stores.favorites.add_posts(&key, &[1, 2]).unwrap();

        stores.favorites.remove_post(&key, 3).unwrap();
        assert_eq!(stores.favorites.get_node(&key).unwrap().post_ids, vec![1, 2]);

        stores.favorites.remove_post(&key, 1).unwrap();
        stores.favorites.remove_post(&key, 1).unwrap();
        assert_eq!(stores.favorites.get_node(&key).unwrap().post_ids, vec![2]);

        assert!(stores.favorites.remove_post("root.none", 1).is_err());
    }

    #[test]
    fn test_post_ids_follow_deletes() {
        let stores = test_stores();
        let foo = stores.favorites.add_child(ROOT_KEY, "Foo").unwrap();
        let bar = stores.favorites.add_child(&foo, "Bar").unwrap();
        stores.favorites.add_post(&bar, 42).unwrap();

        assert_eq!(stores.favorites.get_all_post_ids().unwrap(), vec![42]);

        stores.favorites.delete_node_and_children(&foo).unwrap();
        assert!(stores.favorites.get_all_post_ids().unwrap().is_empty());
    }

    #[test]
    fn test_post_ids_are_deduplicated() {
        let stores = test_stores();
        let a = stores.favorites.add_child(ROOT_KEY, "A").unwrap();
        let b = stores.favorites.add_child(ROOT_KEY, "B").unwrap();
        stores.favorites.add_posts(&a, &[1, 2]).unwrap();
        stores.favorites.add_posts(&b, &[2, 3]).unwrap();

        assert_eq!(stores.favorites.get_all_post_ids().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_favorite_tag_counts() {
        let stores = test_stores();
        stores
            .posts
            .upsert_posts(&[
                sample_post(1, &["holo", "wolf"]),
                sample_post(2, &["holo"]),
                sample_post(3, &["apple"]),
            ])
            .unwrap();

        let a = stores.favorites.add_child(ROOT_KEY, "A").unwrap();
        let b = stores.favorites.add_child(ROOT_KEY, "B").unwrap();
        stores.favorites.add_posts(&a, &[1, 2]).unwrap();
        // Post 2 twice in the tree counts once, post 99 is not cached
        stores.favorites.add_posts(&b, &[2, 3, 99]).unwrap();

        let counts = stores.favorites.get_all_favorite_tags().unwrap();
        let pairs: Vec<_> = counts.iter().map(|c| (c.tag.as_str(), c.count)).collect();
        assert_eq!(pairs, vec![("holo", 2), ("apple", 1), ("wolf", 1)]);
    }

    #[test]
    fn test_move_post() {
        let stores = test_stores();
        let a = stores.favorites.add_child(ROOT_KEY, "A").unwrap();
        let b = stores.favorites.add_child(ROOT_KEY, "B").unwrap();
        stores.favorites.add_post(&a, 7).unwrap();

        stores.favorites.move_post(&a, &b, 7).unwrap();
        assert!(stores.favorites.get_node(&a).unwrap().post_ids.is_empty());
        assert_eq!(stores.favorites.get_node(&b).unwrap().post_ids, vec![7]);

        assert!(matches!(
            stores.favorites.move_post(&a, &b, 7).unwrap_err(),
            StoreError::NotFound { .. }
        ));
        stores.favorites.add_post(&a, 7).unwrap();
        assert!(matches!(
            stores.favorites.move_post(&a, &b, 7).unwrap_err(),
            StoreError::Duplicate(_)
        ));
        // Failed move left both directories as they were
        assert_eq!(stores.favorites.get_node(&a).unwrap().post_ids, vec![7]);
    }

    #[test]
    fn test_move_node_rekeys_subtree() {
        let stores = test_stores();
        let artists = stores.favorites.add_child(ROOT_KEY, "Artists").unwrap();
        let misc = stores.favorites.add_child(ROOT_KEY, "Misc").unwrap();
        let holo = stores.favorites.add_child(&misc, "Holo").unwrap();
        let sketches = stores.favorites.add_child(&holo, "Sketches").unwrap();
        stores.favorites.add_post(&sketches, 11).unwrap();

        let moved = stores.favorites.move_node(&holo, &artists).unwrap();
        assert_eq!(moved, "root.Artists.Holo");

        assert_eq!(
            stores.favorites.get_all_keys().unwrap(),
            vec![
                "root",
                "root.Artists",
                "root.Artists.Holo",
                "root.Artists.Holo.Sketches",
                "root.Misc"
            ]
        );
        let tree = stores.favorites.get_tree().unwrap();
        assert_eq!(tree.find("root.Artists.Holo.Sketches").unwrap().post_ids, vec![11]);
        assert!(tree.find("root.Misc").unwrap().children.is_empty());
    }

    #[test]
    fn test_move_node_rejections() {
        let stores = test_stores();
        let a = stores.favorites.add_child(ROOT_KEY, "A").unwrap();
        let b = stores.favorites.add_child(&a, "B").unwrap();
        let c = stores.favorites.add_child(ROOT_KEY, "C").unwrap();
        stores.favorites.add_child(&c, "B").unwrap();

        assert!(matches!(
            stores.favorites.move_node(ROOT_KEY, &a).unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
        assert!(matches!(
            stores.favorites.move_node(&a, &b).unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
        assert!(matches!(
            stores.favorites.move_node(&b, &c).unwrap_err(),
            StoreError::Duplicate(_)
        ));
        assert!(matches!(
            stores.favorites.move_node(&b, "root.nowhere").unwrap_err(),
            StoreError::NotFound { .. }
        ));

        // Moving to the current parent is a no-op
        assert_eq!(stores.favorites.move_node(&b, &a).unwrap(), b);
    }

    #[test]
    fn test_move_missing_node_under_its_parent() {
        let stores = test_stores();

        let err = stores.favorites.move_node("root.ghost", ROOT_KEY).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(stores.favorites.get_all_keys().unwrap(), vec!["root"]);
    }

    #[test]
    fn test_similar_prefix_is_not_a_descendant() {
        assert!(is_same_or_descendant("root.A", "root.A"));
        assert!(is_same_or_descendant("root.A.B", "root.A"));
        assert!(!is_same_or_descendant("root.AB", "root.A"));
        assert!(!is_same_or_descendant("root", "root.A"));
    }
}
