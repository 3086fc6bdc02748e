//! Key/value application settings.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Database, LogFailure};
use crate::error::Result;

#[derive(Clone)]
pub struct SettingsStore {
    db: Database,
}

impl SettingsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.db.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let result = self.db.lock().and_then(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, raw],
            )?;
            Ok(())
        });
        result.log_failure("Saving setting")
    }

    /// Remove a setting. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let result = self.db.lock().and_then(|conn| {
            let rows = conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
            Ok(rows > 0)
        });
        result.log_failure("Deleting setting")
    }

    pub fn all(&self) -> Result<BTreeMap<String, Value>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut settings = BTreeMap::new();
        for (key, raw) in rows {
            settings.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use crate::database::test_stores;
    use serde_json::json;

    #[test]
    fn test_set_get_delete() {
        let stores = test_stores();
        let settings = &stores.settings;

        assert!(settings.get("theme").unwrap().is_none());

        settings.set("theme", &json!("dark")).unwrap();
        settings.set("page_size", &json!(50)).unwrap();
        settings.set("theme", &json!("light")).unwrap();

        assert_eq!(settings.get("theme").unwrap(), Some(json!("light")));

        let all = settings.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["page_size"], json!(50));

        assert!(settings.delete("theme").unwrap());
        assert!(!settings.delete("theme").unwrap());
    }
}
