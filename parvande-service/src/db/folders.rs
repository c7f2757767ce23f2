//! Folder operations.

use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{Folder, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Insert a new folder
    pub fn insert_folder(&self, folder: &Folder) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO folders (id, person_id, parent_id, name, description, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                folder.id,
                folder.person_id,
                folder.parent_id,
                folder.name,
                folder.description,
                format_timestamp(&folder.created_at),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get a folder by ID
    pub fn get_folder(&self, id: &str) -> ServiceResult<Option<Folder>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {} FROM folders f WHERE f.id = ?1", Folder::COLUMNS),
            params![id],
            Folder::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// All folders of a person, in creation order
    pub fn list_folders_for_person(&self, person_id: &str) -> ServiceResult<Vec<Folder>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM folders f WHERE f.person_id = ?1 ORDER BY f.created_at, f.rowid",
                Folder::COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![person_id], Folder::from_row)
            .map_err(DatabaseError::Query)?;

        let mut folders = Vec::new();
        for row in rows {
            folders.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(folders)
    }

    /// Direct children of `parent_id`, or the person's root folders when `None`
    pub fn list_child_folders(
        &self,
        person_id: &str,
        parent_id: Option<&str>,
    ) -> ServiceResult<Vec<Folder>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM folders f WHERE f.person_id = ?1 AND f.parent_id IS ?2 \
                 ORDER BY f.name, f.rowid",
                Folder::COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![person_id, parent_id], Folder::from_row)
            .map_err(DatabaseError::Query)?;

        let mut folders = Vec::new();
        for row in rows {
            folders.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(folders)
    }
}
