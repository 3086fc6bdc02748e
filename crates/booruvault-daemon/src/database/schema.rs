//! Database schema definitions.
//!
//! Migrations are append-only: a released batch is never edited, new
//! tables and indexes go into a new entry at the end of [`MIGRATIONS`].

/// SQL to create the schema version table.
pub const CREATE_SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
)
"#;

/// Version 1: posts, tags, saved searches, favorites tree, history, settings.
const V1_INITIAL: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY,
    source TEXT NOT NULL DEFAULT '',
    directory TEXT NOT NULL DEFAULT '',
    hash TEXT NOT NULL DEFAULT '',
    width INTEGER NOT NULL DEFAULT 0,
    height INTEGER NOT NULL DEFAULT 0,
    owner TEXT NOT NULL DEFAULT '',
    parent_id INTEGER,
    rating TEXT NOT NULL,
    sample INTEGER NOT NULL DEFAULT 0,
    sample_width INTEGER NOT NULL DEFAULT 0,
    sample_height INTEGER NOT NULL DEFAULT 0,
    score INTEGER NOT NULL DEFAULT 0,
    tags TEXT NOT NULL DEFAULT '[]',
    file_url TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL DEFAULT 0,
    image TEXT NOT NULL DEFAULT '',
    favorite INTEGER NOT NULL DEFAULT 0,
    blacklisted INTEGER NOT NULL DEFAULT 0,
    downloaded INTEGER NOT NULL DEFAULT 0,
    view_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS post_tags (
    post_id INTEGER NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (post_id, tag),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    tag TEXT NOT NULL UNIQUE,
    count INTEGER NOT NULL DEFAULT 0,
    tag_type TEXT NOT NULL DEFAULT 'tag',
    ambiguous INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS saved_searches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tags TEXT NOT NULL,
    excluded_tags TEXT NOT NULL DEFAULT '[]',
    rating TEXT NOT NULL DEFAULT '',
    last_searched INTEGER,
    UNIQUE (tags, excluded_tags, rating)
);

CREATE TABLE IF NOT EXISTS saved_search_previews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    search_id INTEGER NOT NULL,
    thumbnail BLOB NOT NULL,
    FOREIGN KEY (search_id) REFERENCES saved_searches(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS favorites_tree (
    key TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    children_keys TEXT NOT NULL DEFAULT '[]',
    post_ids TEXT NOT NULL DEFAULT '[]'
);

INSERT OR IGNORE INTO favorites_tree (key, title) VALUES ('root', 'root');

CREATE TABLE IF NOT EXISTS tag_search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag TEXT NOT NULL,
    searched_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_post_tags_tag ON post_tags(tag);
CREATE INDEX IF NOT EXISTS idx_posts_favorite ON posts(favorite);
CREATE INDEX IF NOT EXISTS idx_posts_downloaded ON posts(downloaded);
CREATE INDEX IF NOT EXISTS idx_saved_searches_last_searched ON saved_searches(last_searched DESC);
CREATE INDEX IF NOT EXISTS idx_tag_search_history_tag ON tag_search_history(tag)
"#;

/// Version 2: lookups by rating and blacklist state.
const V2_RATING_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_posts_rating ON posts(rating);
CREATE INDEX IF NOT EXISTS idx_posts_blacklisted ON posts(blacklisted)
"#;

/// Ordered schema migrations.
pub const MIGRATIONS: &[(u32, &str)] = &[(1, V1_INITIAL), (2, V2_RATING_INDEXES)];

/// Latest schema version.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|(version, _)| *version).unwrap_or(0)
}
