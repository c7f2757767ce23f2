//! Database module for SQLite operations.
//!
//! This module provides the `Database` struct and all database operations
//! organized into submodules by domain.

mod documents;
mod folders;
mod migrations;
pub mod models;
mod persons;
mod queue;
mod settings;

pub use documents::DocumentFilter;
pub use models::{
    Document, Folder, NewPerson, PendingItem, Person, QueueRecord, QueueStatus,
};
pub use persons::PersonFilter;
pub use queue::QueueCounts;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// Database manager for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> ServiceResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServiceError::Database(DatabaseError::Connection(
                    rusqlite::Error::ToSqlConversionFailure(Box::new(e)),
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> ServiceResult<Self> {
        // Run all migrations
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Escape `%`, `_` and `\` for use in a `LIKE ... ESCAPE '\'` pattern and
/// wrap in wildcards for substring matching.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::Utc;

    pub fn person(db: &Database, national_id: &str) -> Person {
        db.get_or_create_person(&NewPerson {
            employee_id: None,
            first_name: "علی".to_string(),
            last_name: "رضایی".to_string(),
            national_id: national_id.to_string(),
            case_description: "پرونده آزمایشی".to_string(),
        })
        .unwrap()
        .0
    }

    pub fn document(db: &Database, person_id: &str, file_path: &str) -> Document {
        let mut doc = Document {
            id: uuid::Uuid::new_v4().to_string(),
            person_id: person_id.to_string(),
            folder_id: None,
            file_path: file_path.to_string(),
            file_name: file_path.rsplit('/').next().unwrap_or(file_path).to_string(),
            file_type: "txt".to_string(),
            description: String::new(),
            file_hash: None,
            extracted_text: String::new(),
            extraction_confidence: 0.0,
            ocr_processed: false,
            scan_queue_position: 0,
            created_at: Utc::now(),
        };
        db.insert_document_with_queue(&mut doc).unwrap();
        doc
    }

    /// Make every document insert with this file name fail
    pub fn reject_document_named(db: &Database, file_name: &str) {
        db.conn
            .lock()
            .unwrap()
            .execute_batch(&format!(
                "CREATE TRIGGER reject_document BEFORE INSERT ON documents \
                 WHEN NEW.file_name = '{}' \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                file_name
            ))
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("نامه"), "%نامه%");
    }

    #[test]
    fn test_open_on_disk_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("parvande.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert!(db.get_all_settings().unwrap().is_empty());
    }
}
