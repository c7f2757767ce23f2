//! Database model structs.
//!
//! This module contains the data structures for database records.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Timestamp format stored in every `*_at` column. Fixed-width so that
/// lexical ordering in SQL matches chronological ordering.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Status of a scan queue record
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for the worker
    Pending,
    /// Picked up by the worker, extraction in progress
    Processing,
    /// Extraction succeeded and the document was updated
    Completed,
    /// Extraction failed; the document was left untouched
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "processing" => QueueStatus::Processing,
            "completed" => QueueStatus::Completed,
            "failed" => QueueStatus::Failed,
            _ => QueueStatus::Pending,
        }
    }

    /// Whether this status may still change
    pub fn is_live(&self) -> bool {
        matches!(self, QueueStatus::Pending | QueueStatus::Processing)
    }
}

/// Person (case file owner)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub case_description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub(crate) const COLUMNS: &'static str = "p.id, p.employee_id, p.first_name, p.last_name, p.national_id, p.case_description, p.created_at, p.updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(6)?;
        let updated_at_str: String = row.get(7)?;

        Ok(Self {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            national_id: row.get(4)?,
            case_description: row.get(5)?,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

/// Fields supplied when creating a person
#[derive(Debug, Clone, Deserialize)]
pub struct NewPerson {
    #[serde(default)]
    pub employee_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    #[serde(default)]
    pub case_description: String,
}

/// Folder belonging to a person, optionally nested under another folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub person_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Folder {
    pub(crate) const COLUMNS: &'static str =
        "f.id, f.person_id, f.parent_id, f.name, f.description, f.created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(5)?;

        Ok(Self {
            id: row.get(0)?,
            person_id: row.get(1)?,
            parent_id: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

/// Uploaded document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub person_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    /// Path of the stored original, relative to the data directory
    pub file_path: String,
    /// Name of the file as uploaded
    pub file_name: String,
    /// Lowercase extension of the uploaded name, without the dot
    pub file_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    pub extracted_text: String,
    pub extraction_confidence: f64,
    pub ocr_processed: bool,
    /// Number of pending queue records ahead of this one at upload time
    pub scan_queue_position: i64,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub(crate) const COLUMNS: &'static str = "d.id, d.person_id, d.folder_id, d.file_path, d.file_name, d.file_type, d.description, d.file_hash, d.extracted_text, d.extraction_confidence, d.ocr_processed, d.scan_queue_position, d.created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(12)?;

        Ok(Self {
            id: row.get(0)?,
            person_id: row.get(1)?,
            folder_id: row.get(2)?,
            file_path: row.get(3)?,
            file_name: row.get(4)?,
            file_type: row.get(5)?,
            description: row.get(6)?,
            file_hash: row.get(7)?,
            extracted_text: row.get(8)?,
            extraction_confidence: row.get(9)?,
            ocr_processed: row.get(10)?,
            scan_queue_position: row.get(11)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

/// Scan queue record driving extraction of one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRecord {
    pub id: String,
    pub document_id: String,
    pub status: QueueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl QueueRecord {
    pub(crate) const COLUMNS: &'static str =
        "q.id, q.document_id, q.status, q.error, q.created_at, q.processed_at";

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_str: String = row.get(2)?;
        let created_at_str: String = row.get(4)?;
        let processed_at_str: Option<String> = row.get(5)?;

        Ok(Self {
            id: row.get(0)?,
            document_id: row.get(1)?,
            status: QueueStatus::from_str(&status_str),
            error: row.get(3)?,
            created_at: parse_timestamp(&created_at_str),
            processed_at: processed_at_str.as_deref().map(parse_timestamp),
        })
    }
}

/// Pending queue record joined with the document it drives
#[derive(Debug, Clone)]
pub struct PendingItem {
    pub record: QueueRecord,
    pub document: Document,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_status_round_trip() {
        for status in QueueStatus::iter() {
            assert_eq!(QueueStatus::from_str(status.as_str()), status);
            assert_eq!(status.as_ref(), status.as_str());
        }
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let a = DateTime::parse_from_rfc3339("2024-01-01T09:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(format_timestamp(&a) < format_timestamp(&b));
        assert_eq!(parse_timestamp(&format_timestamp(&a)), a);
    }
}
