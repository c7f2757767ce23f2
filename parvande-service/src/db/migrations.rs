//! Database schema migrations.
//!
//! This module contains all database migrations and schema setup.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// This function is called during database initialization to ensure
/// the schema is up to date.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    // Initial schema setup
    conn.execute_batch(
        r#"
        -- Persons (case file owners)
        CREATE TABLE IF NOT EXISTS persons (
            id TEXT PRIMARY KEY,
            employee_id TEXT UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            national_id TEXT NOT NULL UNIQUE,
            case_description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Folders, nested through parent_id
        CREATE TABLE IF NOT EXISTS folders (
            id TEXT PRIMARY KEY,
            person_id TEXT NOT NULL,
            parent_id TEXT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            FOREIGN KEY (person_id) REFERENCES persons(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_id) REFERENCES folders(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_folders_person ON folders(person_id);
        CREATE INDEX IF NOT EXISTS idx_folders_parent ON folders(parent_id);

        -- Uploaded documents
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            person_id TEXT NOT NULL,
            folder_id TEXT,
            file_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_type TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            file_hash TEXT,
            extracted_text TEXT NOT NULL DEFAULT '',
            extraction_confidence REAL NOT NULL DEFAULT 0,
            ocr_processed INTEGER NOT NULL DEFAULT 0,
            scan_queue_position INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (person_id) REFERENCES persons(id) ON DELETE CASCADE,
            FOREIGN KEY (folder_id) REFERENCES folders(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_person ON documents(person_id);
        CREATE INDEX IF NOT EXISTS idx_documents_folder ON documents(folder_id);

        -- Scan queue
        CREATE TABLE IF NOT EXISTS scan_queue (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
            error TEXT,
            created_at TEXT NOT NULL,
            processed_at TEXT,
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_scan_queue_status ON scan_queue(status, created_at);

        -- At most one live record per document
        CREATE UNIQUE INDEX IF NOT EXISTS idx_scan_queue_live_document
            ON scan_queue(document_id) WHERE status IN ('pending', 'processing');
    "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    run_settings_table_migration(conn)?;

    Ok(())
}

/// Migration: Create settings table for runtime configuration overrides
fn run_settings_table_migration(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: format!("Failed to create settings table: {}", e),
    })?;

    Ok(())
}
