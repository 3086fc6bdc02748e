//! SQLite storage context and the stores built on it.

mod favorites;
mod posts;
mod saved_searches;
mod schema;
mod settings;
mod tag_history;
mod tags;

pub use favorites::FavoritesStore;
pub use posts::{Flag, PostStore};
pub use saved_searches::SavedSearchStore;
pub use settings::SettingsStore;
pub use tag_history::TagHistoryStore;
pub use tags::TagStore;

use rusqlite::{params, Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::error::{Result, StoreError};

/// Shared handle to the SQLite database.
///
/// Opened once at startup and cloned into every store.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the database at a specific path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        Self::from_connection(conn, Some(path))
    }

    /// Open a private in-memory database.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        // Enable foreign keys
        conn.execute_batch("PRAGMA foreign_keys = ON")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Path of the database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run pending schema migrations.
    pub fn migrate(&self) -> Result<()> {
        let mut conn = self.lock()?;
        conn.execute_batch(schema::CREATE_SCHEMA_VERSION_TABLE)?;

        let current: u32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

        for (version, batch) in schema::MIGRATIONS {
            if *version <= current {
                continue;
            }

            let tx = conn.transaction()?;
            tx.execute_batch(batch)?;
            tx.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![version, unix_now()],
            )?;
            tx.commit()?;
            info!("Applied schema migration v{}", version);
        }

        debug!("Schema at v{}", schema::latest_version());
        Ok(())
    }

    /// Current schema version.
    #[cfg(test)]
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.lock()?;
        let version = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    /// Lock the connection.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Run `f` inside a transaction, committing only if it succeeds.
    pub(crate) fn transaction<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Get database size in bytes.
    pub fn database_size(&self) -> Result<u64> {
        let conn = self.lock()?;
        let size: i64 = conn.query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )?;
        Ok(size as u64)
    }
}

/// All stores, sharing one database handle.
#[derive(Clone)]
pub struct Stores {
    pub db: Database,
    pub posts: PostStore,
    pub tags: TagStore,
    pub saved_searches: SavedSearchStore,
    pub tag_history: TagHistoryStore,
    pub settings: SettingsStore,
    pub favorites: FavoritesStore,
}

impl Stores {
    pub fn new(db: &Database) -> Self {
        let posts = PostStore::new(db.clone());
        Self {
            db: db.clone(),
            tags: TagStore::new(db.clone()),
            saved_searches: SavedSearchStore::new(db.clone()),
            tag_history: TagHistoryStore::new(db.clone()),
            settings: SettingsStore::new(db.clone()),
            favorites: FavoritesStore::new(db.clone(), posts.clone()),
            posts,
        }
    }
}

/// Log a failed store operation before handing the error to the caller.
pub(crate) trait LogFailure<T> {
    fn log_failure(self, operation: &str) -> Result<T>;
}

impl<T> LogFailure<T> for Result<T> {
    fn log_failure(self, operation: &str) -> Result<T> {
        if let Err(e) = &self {
            error!("{} failed: {}", operation, e);
        }
        self
    }
}

/// Current time as a unix timestamp.
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Wrap a decode failure of column `idx` as a rusqlite error.
pub(crate) fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

#[cfg(test)]
pub(crate) fn test_stores() -> Stores {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();
    Stores::new(&db)
}
