//! Settings storage operations.
//!
//! Key/value overrides for the hot-reloadable configuration. Values are
//! stored as JSON text.

use chrono::Utc;
use rusqlite::params;
use std::collections::HashMap;
use tracing::warn;

use super::Database;
use super::models::format_timestamp;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Every stored override. Rows whose value is not valid JSON are logged
    /// and left out, so the defaults apply for those keys.
    pub fn get_all_settings(&self) -> ServiceResult<HashMap<String, serde_json::Value>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT key, value FROM settings ORDER BY key")
            .map_err(DatabaseError::Query)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(DatabaseError::Query)?;

        let mut settings = HashMap::new();
        for row in rows {
            let (key, raw) = row.map_err(DatabaseError::Query)?;
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    settings.insert(key, value);
                }
                Err(e) => warn!(key = %key, error = %e, "Ignoring unparsable setting override"),
            }
        }

        Ok(settings)
    }

    /// Apply a batch of overrides atomically. A null value removes the
    /// override for that key.
    pub fn set_settings(&self, settings: HashMap<String, serde_json::Value>) -> ServiceResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(DatabaseError::Query)?;
        let now = format_timestamp(&Utc::now());

        for (key, value) in &settings {
            if value.is_null() {
                tx.execute("DELETE FROM settings WHERE key = ?1", params![key])
                    .map_err(DatabaseError::Query)?;
                continue;
            }

            let raw = serde_json::to_string(value).map_err(DatabaseError::Serialization)?;
            tx.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, raw, now],
            )
            .map_err(DatabaseError::Query)?;
        }

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear_settings() {
        let db = Database::open_in_memory().unwrap();

        let mut update = HashMap::new();
        update.insert("worker.poll_interval_secs".to_string(), serde_json::json!(5));
        update.insert("ocr.printed_text_threshold".to_string(), serde_json::json!(0.5));
        db.set_settings(update).unwrap();

        let stored = db.get_all_settings().unwrap();
        assert_eq!(stored["worker.poll_interval_secs"], serde_json::json!(5));
        assert_eq!(stored.len(), 2);

        let mut clear = HashMap::new();
        clear.insert("worker.poll_interval_secs".to_string(), serde_json::Value::Null);
        db.set_settings(clear).unwrap();

        let stored = db.get_all_settings().unwrap();
        assert!(!stored.contains_key("worker.poll_interval_secs"));
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn test_failed_batch_leaves_nothing_behind() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_setting BEFORE INSERT ON settings \
                 WHEN NEW.key = 'worker.error_backoff_secs' \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let mut update = HashMap::new();
        update.insert("worker.poll_interval_secs".to_string(), serde_json::json!(5));
        update.insert("worker.error_backoff_secs".to_string(), serde_json::json!(60));
        assert!(db.set_settings(update).is_err());

        assert!(db.get_all_settings().unwrap().is_empty());
    }

    #[test]
    fn test_unparsable_row_is_skipped() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO settings (key, value) VALUES ('ocr.printed_text_threshold', 'not json')",
                [],
            )
            .unwrap();

        let mut update = HashMap::new();
        update.insert("worker.poll_interval_secs".to_string(), serde_json::json!(7));
        db.set_settings(update).unwrap();

        let stored = db.get_all_settings().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored["worker.poll_interval_secs"], serde_json::json!(7));
    }
}
