//! Document upload, content view, original file access and re-submission.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use super::ArchiveService;
use crate::db::{Document, Folder, QueueRecord, QueueStatus};
use crate::error::{ProcessingError, ServiceError, ServiceResult};
use crate::storage;

/// One file received in an upload request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Per-file upload receipt
#[derive(Debug, Clone, Serialize)]
pub struct UploadedDocument {
    pub document_id: String,
    pub file_name: String,
    pub queue_position: i64,
}

/// Stored extraction results plus display metadata
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub id: String,
    pub person_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    pub file_name: String,
    pub description: String,
    pub extracted_text: String,
    pub confidence: f64,
    pub processed: bool,
    pub person_name: String,
    pub original_file_url: String,
    pub file_extension: String,
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_status: Option<QueueStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ArchiveService {
    /// Store a batch of files for a person and queue each one for extraction.
    ///
    /// Sizes are checked for the whole batch before anything is written. The
    /// batch is all or nothing: if any file fails, the files and documents
    /// already stored for it are removed again.
    pub fn upload_documents(
        &self,
        person_id: &str,
        files: Vec<UploadedFile>,
        folder_id: Option<&str>,
        description: &str,
    ) -> ServiceResult<Vec<UploadedDocument>> {
        if files.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "No files uploaded".to_string(),
            });
        }

        let person = self.require_person(person_id)?;
        let folder = match folder_id.filter(|id| !id.is_empty()) {
            Some(id) => Some(self.require_folder_of(&person.id, id)?),
            None => None,
        };

        // Check file size
        let max_size = self.runtime_config.dynamic().limits.max_document_size_bytes;
        if let Some(file) = files.iter().find(|f| f.content.len() as u64 > max_size) {
            return Err(ServiceError::Processing(ProcessingError::FileTooLarge {
                size: file.content.len() as u64,
                max: max_size,
            }));
        }

        let mut receipts = Vec::with_capacity(files.len());
        let mut stored: Vec<(PathBuf, Option<String>)> = Vec::with_capacity(files.len());
        for file in files {
            let result =
                self.store_document(&person.id, folder.as_ref(), file, description, &mut stored);
            match result {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => {
                    self.discard_batch(&stored);
                    return Err(e);
                }
            }
        }

        Ok(receipts)
    }

    /// Write one file and insert its document and queue record. Every path
    /// written and document inserted is pushed to `stored`.
    fn store_document(
        &self,
        person_id: &str,
        folder: Option<&Folder>,
        file: UploadedFile,
        description: &str,
        stored: &mut Vec<(PathBuf, Option<String>)>,
    ) -> ServiceResult<UploadedDocument> {
        let file_type = storage::file_extension(&file.file_name);
        let relative = storage::document_path(person_id, folder.map(|f| f.id.as_str()), &file_type);
        let full = storage::store(self.data_dir(), &relative, &file.content)
            .map_err(|e| ServiceError::Processing(ProcessingError::Io(e)))?;
        stored.push((full, None));

        let mut document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            person_id: person_id.to_string(),
            folder_id: folder.map(|f| f.id.clone()),
            file_path: storage::to_stored_path(&relative),
            file_name: file.file_name,
            file_type,
            description: description.to_string(),
            file_hash: Some(storage::compute_content_hash(&file.content)),
            extracted_text: String::new(),
            extraction_confidence: 0.0,
            ocr_processed: false,
            scan_queue_position: 0,
            created_at: Utc::now(),
        };

        // Save document to database (enqueue for processing)
        let record = self.db.insert_document_with_queue(&mut document)?;
        if let Some(last) = stored.last_mut() {
            last.1 = Some(document.id.clone());
        }

        info!(
            doc_id = %document.id,
            queue_id = %record.id,
            file_name = %document.file_name,
            queue_position = document.scan_queue_position,
            "Document uploaded and queued for processing"
        );

        Ok(UploadedDocument {
            document_id: document.id,
            file_name: document.file_name,
            queue_position: document.scan_queue_position,
        })
    }

    /// Undo a partially stored batch so a failed upload leaves nothing behind
    fn discard_batch(&self, stored: &[(PathBuf, Option<String>)]) {
        for (path, document_id) in stored {
            if let Some(id) = document_id
                && let Err(e) = self.db.delete_document(id)
            {
                warn!(doc_id = %id, error = %e, "Failed to remove document of a failed upload");
            }
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove file of a failed upload");
            }
        }
    }

    pub fn require_document(&self, document_id: &str) -> ServiceResult<Document> {
        self.db
            .get_document(document_id)?
            .ok_or_else(|| ServiceError::DocumentNotFound {
                document_id: document_id.to_string(),
            })
    }

    pub fn document_view(&self, document_id: &str) -> ServiceResult<DocumentView> {
        let document = self.require_document(document_id)?;
        let person = self.require_person(&document.person_id)?;
        let queue = self.db.latest_queue_record(&document.id)?;

        Ok(DocumentView {
            original_file_url: format!("/api/documents/{}/file", document.id),
            file_extension: storage::file_extension(&document.file_name),
            person_name: person.full_name(),
            queue_status: queue.as_ref().map(|q| q.status),
            queue_error: queue.and_then(|q| q.error),
            id: document.id,
            person_id: document.person_id,
            folder_id: document.folder_id,
            file_name: document.file_name,
            description: document.description,
            extracted_text: document.extracted_text,
            confidence: document.extraction_confidence,
            processed: document.ocr_processed,
            file_type: document.file_type,
            file_hash: document.file_hash,
            created_at: document.created_at,
        })
    }

    /// The document and the absolute path of its stored original
    pub fn document_file(&self, document_id: &str) -> ServiceResult<(Document, PathBuf)> {
        let document = self.require_document(document_id)?;
        let path = self.resolve_path(&document.file_path);
        Ok((document, path))
    }

    /// Queue an unprocessed document again after a failed extraction
    pub fn requeue_document(&self, document_id: &str) -> ServiceResult<QueueRecord> {
        let document = self.require_document(document_id)?;
        if document.ocr_processed {
            return Err(ServiceError::Conflict {
                message: format!("Document {} is already processed", document_id),
            });
        }

        if let Some(latest) = self.db.latest_queue_record(&document.id)?
            && latest.status.is_live()
        {
            return Err(ServiceError::Conflict {
                message: format!("Document {} is already {}", document_id, latest.status.as_str()),
            });
        }

        let record = self.db.enqueue_document(&document.id)?;
        info!(doc_id = %document.id, queue_id = %record.id, "Document re-queued");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::service::{NewFolder, testing};

    fn file(name: &str, content: &[u8]) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content: content.to_vec(),
        }
    }

    #[test]
    fn test_upload_stores_files_and_queues_them() {
        let ts = testing::service();
        let person = test_support::person(&ts.service.db, "1111111111");
        let folder = ts
            .service
            .create_folder(
                &person.id,
                NewFolder {
                    name: "مدارک".to_string(),
                    description: String::new(),
                    parent_folder_id: None,
                },
            )
            .unwrap();

        let receipts = ts
            .service
            .upload_documents(
                &person.id,
                vec![file("نامه.TXT", "سلام".as_bytes()), file("scan.png", b"png")],
                Some(&folder.id),
                "پرونده",
            )
            .unwrap();

        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].queue_position, 1);
        assert_eq!(receipts[1].queue_position, 2);

        let doc = ts.service.require_document(&receipts[0].document_id).unwrap();
        assert_eq!(doc.file_type, "txt");
        assert_eq!(doc.folder_id.as_deref(), Some(folder.id.as_str()));
        assert_eq!(doc.description, "پرونده");
        assert!(doc.file_path.starts_with(&format!("documents/{}/{}/", person.id, folder.id)));
        assert_eq!(
            doc.file_hash.as_deref(),
            Some(storage::compute_content_hash("سلام".as_bytes()).as_str())
        );

        let stored = std::fs::read(ts.service.resolve_path(&doc.file_path)).unwrap();
        assert_eq!(stored, "سلام".as_bytes());
        assert_eq!(ts.service.db.queue_counts().unwrap().pending, 2);
    }

    #[test]
    fn test_upload_rejects_oversized_batch() {
        let ts = testing::service();
        let person = test_support::person(&ts.service.db, "1111111111");
        let mut config = (**ts.service.runtime_config.dynamic()).clone();
        config.limits.max_document_size_bytes = 4;
        ts.service.runtime_config.update_dynamic(config);

        let err = ts
            .service
            .upload_documents(
                &person.id,
                vec![file("a.txt", b"ok"), file("b.txt", b"too large")],
                None,
                "",
            )
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Processing(ProcessingError::FileTooLarge { size: 9, max: 4 })
        ));
        assert_eq!(ts.service.db.queue_counts().unwrap().pending, 0);
        assert!(!ts.dir.path().join("documents").exists());
    }

    #[test]
    fn test_upload_validation() {
        let ts = testing::service();
        let person = test_support::person(&ts.service.db, "1111111111");

        assert!(matches!(
            ts.service.upload_documents(&person.id, vec![], None, ""),
            Err(ServiceError::InvalidRequest { .. })
        ));
        assert!(matches!(
            ts.service.upload_documents("missing", vec![file("a.txt", b"a")], None, ""),
            Err(ServiceError::PersonNotFound { .. })
        ));
        assert!(matches!(
            ts.service
                .upload_documents(&person.id, vec![file("a.txt", b"a")], Some("nope"), ""),
            Err(ServiceError::FolderNotFound { .. })
        ));
    }

    #[test]
    fn test_document_view() {
        let ts = testing::service();
        let person = test_support::person(&ts.service.db, "1111111111");
        let receipts = ts
            .service
            .upload_documents(&person.id, vec![file("Report.PDF", b"%PDF-")], None, "")
            .unwrap();

        let view = ts.service.document_view(&receipts[0].document_id).unwrap();
        assert_eq!(view.person_name, "علی رضایی");
        assert_eq!(view.file_extension, "pdf");
        assert_eq!(view.file_type, "pdf");
        assert!(!view.processed);
        assert_eq!(view.queue_status, Some(QueueStatus::Pending));
        assert_eq!(
            view.original_file_url,
            format!("/api/documents/{}/file", view.id)
        );
    }

    #[test]
    fn test_failed_batch_is_rolled_back() {
        let ts = testing::service();
        let person = test_support::person(&ts.service.db, "1111111111");
        test_support::reject_document_named(&ts.service.db, "bad.txt");

        let result = ts.service.upload_documents(
            &person.id,
            vec![file("good.txt", b"good"), file("bad.txt", b"bad")],
            None,
            "",
        );
        assert!(result.is_err());

        assert_eq!(ts.service.db.count_documents_for_person(&person.id).unwrap(), 0);
        assert_eq!(ts.service.queue_overview().unwrap().counts.pending, 0);
        let person_dir = ts.dir.path().join("documents").join(&person.id);
        let leftovers = std::fs::read_dir(&person_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_requeue_rules() {
        let ts = testing::service();
        let person = test_support::person(&ts.service.db, "1111111111");
        let doc = test_support::document(&ts.service.db, &person.id, "documents/p/a.txt");

        // Live record already present
        assert!(matches!(
            ts.service.requeue_document(&doc.id),
            Err(ServiceError::Conflict { .. })
        ));

        let record = ts.service.db.latest_queue_record(&doc.id).unwrap().unwrap();
        ts.service.db.mark_queue_processing(&record.id).unwrap();
        ts.service.db.fail_queue_item(&record.id, "boom").unwrap();

        let again = ts.service.requeue_document(&doc.id).unwrap();
        assert_eq!(again.status, QueueStatus::Pending);
        assert_ne!(again.id, record.id);

        assert!(matches!(
            ts.service.requeue_document("missing"),
            Err(ServiceError::DocumentNotFound { .. })
        ));
    }
}
