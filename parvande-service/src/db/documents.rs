//! Document operations.
//!
//! Documents are inserted together with their first scan queue record; the
//! extraction fields are only written by the queue completion path in
//! `queue.rs`.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::models::{Document, QueueRecord, QueueStatus, format_timestamp};
use super::{Database, like_pattern};
use crate::error::{DatabaseError, ServiceResult};

/// Document search criteria. `any` matches file name, description, extracted
/// text and owner names; `text` matches file name, description and extracted
/// text. Criteria are combined with AND.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub any: Option<String>,
    pub text: Option<String>,
    pub processed: Option<bool>,
}

impl Database {
    /// Insert a document and a pending queue record for it in one transaction.
    ///
    /// `scan_queue_position` is set to the number of pending records once this
    /// one is queued, so the first document in an empty queue is at 1.
    pub fn insert_document_with_queue(&self, doc: &mut Document) -> ServiceResult<QueueRecord> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        tx.execute(
            r#"
            INSERT INTO documents (id, person_id, folder_id, file_path, file_name, file_type, description, file_hash, extracted_text, extraction_confidence, ocr_processed, scan_queue_position, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                doc.id,
                doc.person_id,
                doc.folder_id,
                doc.file_path,
                doc.file_name,
                doc.file_type,
                doc.description,
                doc.file_hash,
                doc.extracted_text,
                doc.extraction_confidence,
                doc.ocr_processed,
                doc.scan_queue_position,
                format_timestamp(&doc.created_at),
            ],
        )
        .map_err(DatabaseError::Query)?;

        let record = QueueRecord {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            status: QueueStatus::Pending,
            error: None,
            created_at: Utc::now(),
            processed_at: None,
        };

        tx.execute(
            "INSERT INTO scan_queue (id, document_id, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                record.document_id,
                record.status.as_str(),
                format_timestamp(&record.created_at),
            ],
        )
        .map_err(DatabaseError::Query)?;

        doc.scan_queue_position = tx
            .query_row(
                "SELECT COUNT(*) FROM scan_queue WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;
        tx.execute(
            "UPDATE documents SET scan_queue_position = ?1 WHERE id = ?2",
            params![doc.scan_queue_position, doc.id],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;

        Ok(record)
    }

    /// Get a document by ID
    pub fn get_document(&self, id: &str) -> ServiceResult<Option<Document>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {} FROM documents d WHERE d.id = ?1", Document::COLUMNS),
            params![id],
            Document::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Documents in a folder, or the person's documents outside any folder
    /// when `folder_id` is `None`
    pub fn list_documents_in_folder(
        &self,
        person_id: &str,
        folder_id: Option<&str>,
    ) -> ServiceResult<Vec<Document>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM documents d WHERE d.person_id = ?1 AND d.folder_id IS ?2 \
                 ORDER BY d.scan_queue_position, d.created_at, d.rowid",
                Document::COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![person_id, folder_id], Document::from_row)
            .map_err(DatabaseError::Query)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(docs)
    }

    /// Delete a document; its queue records go with it
    pub fn delete_document(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Number of documents owned by a person
    pub fn count_documents_for_person(&self, person_id: &str) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE person_id = ?1",
                params![person_id],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        Ok(count as usize)
    }

    /// Search documents
    pub fn search_documents(&self, filter: &DocumentFilter) -> ServiceResult<Vec<Document>> {
        let conn = self.conn.lock().unwrap();

        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(any) = &filter.any {
            clauses.push(
                "(d.file_name LIKE ? ESCAPE '\\' OR d.description LIKE ? ESCAPE '\\' \
                 OR d.extracted_text LIKE ? ESCAPE '\\' OR p.first_name LIKE ? ESCAPE '\\' \
                 OR p.last_name LIKE ? ESCAPE '\\')",
            );
            values.extend(std::iter::repeat_n(like_pattern(any), 5));
        }
        if let Some(text) = &filter.text {
            clauses.push(
                "(d.extracted_text LIKE ? ESCAPE '\\' OR d.file_name LIKE ? ESCAPE '\\' \
                 OR d.description LIKE ? ESCAPE '\\')",
            );
            values.extend(std::iter::repeat_n(like_pattern(text), 3));
        }
        match filter.processed {
            Some(true) => clauses.push("d.ocr_processed = 1"),
            Some(false) => clauses.push("d.ocr_processed = 0"),
            None => {}
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM documents d JOIN persons p ON p.id = d.person_id {} \
                 ORDER BY d.scan_queue_position, d.created_at, d.rowid",
                Document::COLUMNS,
                where_clause
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), Document::from_row)
            .map_err(DatabaseError::Query)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[test]
    fn test_queue_position_counts_pending_records() {
        let db = Database::open_in_memory().unwrap();
        let person = test_support::person(&db, "0012345678");

        let first = test_support::document(&db, &person.id, "documents/a.txt");
        let second = test_support::document(&db, &person.id, "documents/b.txt");
        // The new record counts itself
        assert_eq!(first.scan_queue_position, 1);
        assert_eq!(second.scan_queue_position, 2);

        let stored = db.get_document(&second.id).unwrap().unwrap();
        assert_eq!(stored.scan_queue_position, 2);

        // Completed records no longer count
        let record = db.latest_queue_record(&first.id).unwrap().unwrap();
        db.mark_queue_processing(&record.id).unwrap();
        db.complete_queue_item(&record.id, &first.id, "متن", 1.0).unwrap();
        let third = test_support::document(&db, &person.id, "documents/c.txt");
        assert_eq!(third.scan_queue_position, 2);
        assert!(!stored.ocr_processed);
        assert_eq!(
            db.latest_queue_record(&second.id).unwrap().unwrap().status,
            QueueStatus::Pending
        );
    }

    #[test]
    fn test_loose_documents_and_counts() {
        let db = Database::open_in_memory().unwrap();
        let person = test_support::person(&db, "0012345678");
        test_support::document(&db, &person.id, "documents/a.txt");

        assert_eq!(db.list_documents_in_folder(&person.id, None).unwrap().len(), 1);
        assert_eq!(
            db.list_documents_in_folder(&person.id, Some("nope")).unwrap().len(),
            0
        );
        assert_eq!(db.count_documents_for_person(&person.id).unwrap(), 1);
    }

    #[test]
    fn test_search_documents_by_owner_and_status() {
        let db = Database::open_in_memory().unwrap();
        let person = test_support::person(&db, "0012345678");
        let doc = test_support::document(&db, &person.id, "documents/contract.txt");

        let by_owner = db
            .search_documents(&DocumentFilter {
                any: Some("رضایی".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_owner.len(), 1);
        assert_eq!(by_owner[0].id, doc.id);

        let processed = db
            .search_documents(&DocumentFilter {
                processed: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert!(processed.is_empty());

        let by_name = db
            .search_documents(&DocumentFilter {
                text: Some("contract".to_string()),
                processed: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_name.len(), 1);
    }

    #[test]
    fn test_delete_document_removes_queue_records() {
        let db = Database::open_in_memory().unwrap();
        let person = test_support::person(&db, "0012345678");
        let doc = test_support::document(&db, &person.id, "documents/a.txt");

        assert!(db.delete_document(&doc.id).unwrap());
        assert!(db.get_document(&doc.id).unwrap().is_none());
        assert!(db.latest_queue_record(&doc.id).unwrap().is_none());
        assert!(!db.delete_document(&doc.id).unwrap());
    }
}
