//! Scan queue operations.
//!
//! Every status change is guarded by the status it leaves, so an illegal
//! transition updates zero rows and the caller gets `false` back.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;

use super::Database;
use super::models::{Document, PendingItem, QueueRecord, QueueStatus, format_timestamp};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// Number of queue records per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl Database {
    /// All pending records with their documents, oldest first
    pub fn list_pending_items(&self) -> ServiceResult<Vec<PendingItem>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM scan_queue q WHERE q.status = 'pending' ORDER BY q.created_at, q.rowid",
                QueueRecord::COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], QueueRecord::from_row)
            .map_err(DatabaseError::Query)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(DatabaseError::Query)?);
        }

        let mut doc_stmt = conn
            .prepare(&format!(
                "SELECT {} FROM documents d WHERE d.id = ?1",
                Document::COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let document = doc_stmt
                .query_row(params![record.document_id], Document::from_row)
                .map_err(DatabaseError::Query)?;
            items.push(PendingItem { record, document });
        }

        Ok(items)
    }

    /// pending -> processing
    pub fn mark_queue_processing(&self, queue_id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE scan_queue SET status = 'processing' WHERE id = ?1 AND status = 'pending'",
                params![queue_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// processing -> completed, storing the extraction on the document in the
    /// same transaction
    pub fn complete_queue_item(
        &self,
        queue_id: &str,
        document_id: &str,
        extracted_text: &str,
        confidence: f64,
    ) -> ServiceResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let rows = tx
            .execute(
                "UPDATE scan_queue SET status = 'completed', processed_at = ?1, error = NULL \
                 WHERE id = ?2 AND document_id = ?3 AND status = 'processing'",
                params![format_timestamp(&Utc::now()), queue_id, document_id],
            )
            .map_err(DatabaseError::Query)?;

        if rows == 0 {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        tx.execute(
            "UPDATE documents SET extracted_text = ?1, extraction_confidence = ?2, ocr_processed = 1 \
             WHERE id = ?3",
            params![extracted_text, confidence, document_id],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;

        Ok(true)
    }

    /// processing -> failed. The document is not touched.
    pub fn fail_queue_item(&self, queue_id: &str, reason: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE scan_queue SET status = 'failed', processed_at = ?1, error = ?2 \
                 WHERE id = ?3 AND status = 'processing'",
                params![format_timestamp(&Utc::now()), reason, queue_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Fail every record left in `processing`, e.g. by a crash mid-item.
    /// Returns the number of records moved.
    pub fn fail_stale_processing(&self, reason: &str) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE scan_queue SET status = 'failed', processed_at = ?1, error = ?2 \
                 WHERE status = 'processing'",
                params![format_timestamp(&Utc::now()), reason],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows)
    }

    /// Add a new pending record for a document. Fails with a conflict when
    /// the document already has a live record.
    pub fn enqueue_document(&self, document_id: &str) -> ServiceResult<QueueRecord> {
        let conn = self.conn.lock().unwrap();

        let record = QueueRecord {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            status: QueueStatus::Pending,
            error: None,
            created_at: Utc::now(),
            processed_at: None,
        };

        conn.execute(
            "INSERT INTO scan_queue (id, document_id, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                record.document_id,
                record.status.as_str(),
                format_timestamp(&record.created_at),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                ServiceError::Conflict {
                    message: format!("Document {} is already queued", document_id),
                }
            }
            e => DatabaseError::Query(e).into(),
        })?;

        Ok(record)
    }

    /// Get a queue record by ID
    #[cfg(test)]
    pub fn get_queue_record(&self, id: &str) -> ServiceResult<Option<QueueRecord>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {} FROM scan_queue q WHERE q.id = ?1", QueueRecord::COLUMNS),
            params![id],
            QueueRecord::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Most recent queue record of a document
    pub fn latest_queue_record(&self, document_id: &str) -> ServiceResult<Option<QueueRecord>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "SELECT {} FROM scan_queue q WHERE q.document_id = ?1 \
                 ORDER BY q.created_at DESC, q.rowid DESC LIMIT 1",
                QueueRecord::COLUMNS
            ),
            params![document_id],
            QueueRecord::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Count records per status
    pub fn queue_counts(&self) -> ServiceResult<QueueCounts> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM scan_queue GROUP BY status")
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count as usize))
            })
            .map_err(DatabaseError::Query)?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let (status, count) = row.map_err(DatabaseError::Query)?;
            match QueueStatus::from_str(&status) {
                QueueStatus::Pending => counts.pending = count,
                QueueStatus::Processing => counts.processing = count,
                QueueStatus::Completed => counts.completed = count,
                QueueStatus::Failed => counts.failed = count,
            }
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[test]
    fn test_happy_path_transitions() {
        let db = Database::open_in_memory().unwrap();
        let person = test_support::person(&db, "0012345678");
        let doc = test_support::document(&db, &person.id, "documents/a.txt");

        let items = db.list_pending_items().unwrap();
        assert_eq!(items.len(), 1);
        let queue_id = items[0].record.id.clone();
        assert_eq!(items[0].document.id, doc.id);

        assert!(db.mark_queue_processing(&queue_id).unwrap());
        // Second pickup is a no-op
        assert!(!db.mark_queue_processing(&queue_id).unwrap());
        assert!(db.list_pending_items().unwrap().is_empty());

        assert!(db.complete_queue_item(&queue_id, &doc.id, "سلام", 1.0).unwrap());

        let record = db.get_queue_record(&queue_id).unwrap().unwrap();
        assert_eq!(record.status, QueueStatus::Completed);
        assert!(record.processed_at.is_some());

        let stored = db.get_document(&doc.id).unwrap().unwrap();
        assert!(stored.ocr_processed);
        assert_eq!(stored.extracted_text, "سلام");
        assert_eq!(stored.extraction_confidence, 1.0);
    }

    #[test]
    fn test_terminal_states_never_move() {
        let db = Database::open_in_memory().unwrap();
        let person = test_support::person(&db, "0012345678");
        let doc = test_support::document(&db, &person.id, "documents/a.txt");
        let queue_id = db.list_pending_items().unwrap()[0].record.id.clone();

        // pending cannot skip to a terminal state
        assert!(!db.fail_queue_item(&queue_id, "nope").unwrap());
        assert!(!db.complete_queue_item(&queue_id, &doc.id, "x", 1.0).unwrap());
        assert!(!db.get_document(&doc.id).unwrap().unwrap().ocr_processed);

        assert!(db.mark_queue_processing(&queue_id).unwrap());
        assert!(db.fail_queue_item(&queue_id, "decode_failure").unwrap());

        // failed cannot complete, and the document is untouched
        assert!(!db.complete_queue_item(&queue_id, &doc.id, "x", 1.0).unwrap());
        assert!(!db.mark_queue_processing(&queue_id).unwrap());
        let stored = db.get_document(&doc.id).unwrap().unwrap();
        assert!(!stored.ocr_processed);
        assert_eq!(stored.extracted_text, "");

        let record = db.get_queue_record(&queue_id).unwrap().unwrap();
        assert_eq!(record.status, QueueStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("decode_failure"));
    }

    #[test]
    fn test_one_live_record_per_document() {
        let db = Database::open_in_memory().unwrap();
        let person = test_support::person(&db, "0012345678");
        let doc = test_support::document(&db, &person.id, "documents/a.txt");

        let err = db.enqueue_document(&doc.id).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict { .. }));

        let queue_id = db.list_pending_items().unwrap()[0].record.id.clone();
        db.mark_queue_processing(&queue_id).unwrap();
        db.fail_queue_item(&queue_id, "boom").unwrap();

        let again = db.enqueue_document(&doc.id).unwrap();
        assert_eq!(again.status, QueueStatus::Pending);
        assert_eq!(db.latest_queue_record(&doc.id).unwrap().unwrap().id, again.id);
    }

    #[test]
    fn test_stale_processing_recovery_and_counts() {
        let db = Database::open_in_memory().unwrap();
        let person = test_support::person(&db, "0012345678");
        test_support::document(&db, &person.id, "documents/a.txt");
        test_support::document(&db, &person.id, "documents/b.txt");

        let queue_id = db.list_pending_items().unwrap()[0].record.id.clone();
        db.mark_queue_processing(&queue_id).unwrap();

        assert_eq!(
            db.queue_counts().unwrap(),
            QueueCounts {
                pending: 1,
                processing: 1,
                ..Default::default()
            }
        );

        assert_eq!(db.fail_stale_processing("interrupted").unwrap(), 1);
        let counts = db.queue_counts().unwrap();
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.processing, 0);
        assert_eq!(counts.pending, 1);
    }
}
