use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::i18n::I18n;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Person not found: {person_id}")]
    PersonNotFound { person_id: String },

    #[error("Folder not found: {folder_id}")]
    FolderNotFound { folder_id: String },

    #[error("Document not found: {document_id}")]
    DocumentNotFound { document_id: String },

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Document processing failed")]
    Processing(#[from] ProcessingError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// Upload and storage errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("IO error")]
    Io(#[source] std::io::Error),
}

/// Failures on the text extraction path.
///
/// These never escape the extractor: they are folded into an
/// [`ExtractionResult`](crate::ocr::ExtractionResult) carrying the matching
/// [`ExtractionErrorKind`] and a confidence of zero.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported file format")]
    UnsupportedFormat,

    #[error("Failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    #[error("OCR engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    #[error("OCR engine failed: {message}")]
    Engine { message: String },

    #[error("PDF processing failed on page {page}: {message}")]
    Pdf { page: u32, message: String },

    #[error("PDF library unavailable: {message}")]
    PdfLibrary { message: String },

    #[error("IO error")]
    Io(#[source] std::io::Error),
}

/// Machine-readable tag for a failed extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtractionErrorKind {
    FileNotFound,
    UnsupportedFormat,
    DecodeFailure,
    EngineUnavailable,
    EngineException,
}

impl ExtractionError {
    pub fn kind(&self) -> ExtractionErrorKind {
        match self {
            ExtractionError::FileNotFound { .. } => ExtractionErrorKind::FileNotFound,
            ExtractionError::UnsupportedFormat => ExtractionErrorKind::UnsupportedFormat,
            ExtractionError::Decode { .. } | ExtractionError::Pdf { .. } => {
                ExtractionErrorKind::DecodeFailure
            }
            ExtractionError::EngineUnavailable { .. } | ExtractionError::PdfLibrary { .. } => {
                ExtractionErrorKind::EngineUnavailable
            }
            ExtractionError::Engine { .. } => ExtractionErrorKind::EngineException,
            ExtractionError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ExtractionErrorKind::FileNotFound
            }
            ExtractionError::Io(_) => ExtractionErrorKind::DecodeFailure,
        }
    }
}

/// API error response (matches Axum's built-in JsonRejection format)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::PersonNotFound { .. }
            | ServiceError::FolderNotFound { .. }
            | ServiceError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Conflict { .. } => StatusCode::CONFLICT,
            ServiceError::Processing(ProcessingError::FileTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::PersonNotFound { .. } => "person_not_found",
            ServiceError::FolderNotFound { .. } => "folder_not_found",
            ServiceError::DocumentNotFound { .. } => "document_not_found",
            ServiceError::Database(_) => "database_error",
            ServiceError::Processing(ProcessingError::FileTooLarge { .. }) => "file_too_large",
            ServiceError::Processing(ProcessingError::Io(_)) => "io_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Conflict { .. } => "conflict",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }

    /// Get a user-friendly translated message
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            ServiceError::PersonNotFound { person_id } => {
                i18n.format(locale, "error-person-not-found", &[("id", person_id)])
            }
            ServiceError::FolderNotFound { folder_id } => {
                i18n.format(locale, "error-folder-not-found", &[("id", folder_id)])
            }
            ServiceError::DocumentNotFound { document_id } => {
                i18n.format(locale, "error-document-not-found", &[("id", document_id)])
            }
            ServiceError::Processing(ProcessingError::FileTooLarge { size, max }) => i18n.format(
                locale,
                "error-file-too-large",
                &[("size", &size.to_string()), ("max", &max.to_string())],
            ),
            ServiceError::Internal { .. } | ServiceError::Database(_) => {
                i18n.get(locale, "error-internal", None)
            }
            // For other errors, fall back to the technical message
            _ => self.to_string(),
        }
    }

    /// Convert to an error response with i18n support
    pub fn into_response_with_i18n(self, i18n: &I18n, locale: &str) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();
        let message = self.user_message(i18n, locale);

        if status.is_server_error() {
            tracing::error!(error = %format_error_chain_ref(&self), "Request failed");
        }

        let response = ErrorResponse {
            message,
            code: Some(code),
        };

        (status, Json(response)).into_response()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(code),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error and all of its sources as `outer: inner: innermost`.
pub fn format_error_chain_ref(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Error wrapper with i18n support for API responses
pub struct I18nError {
    pub error: ServiceError,
    pub i18n: std::sync::Arc<I18n>,
    pub locale: String,
}

impl I18nError {
    pub fn new(error: ServiceError, i18n: std::sync::Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            error,
            i18n,
            locale: locale.into(),
        }
    }
}

impl IntoResponse for I18nError {
    fn into_response(self) -> Response {
        self.error.into_response_with_i18n(&self.i18n, &self.locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_kinds() {
        assert_eq!(
            ExtractionError::UnsupportedFormat.kind(),
            ExtractionErrorKind::UnsupportedFormat
        );
        assert_eq!(
            ExtractionError::Pdf {
                page: 2,
                message: "bad xref".to_string()
            }
            .kind(),
            ExtractionErrorKind::DecodeFailure
        );
        // A valid PDF must not be reported as corrupt when pdfium is missing
        assert_eq!(
            ExtractionError::PdfLibrary {
                message: "libpdfium.so not found".to_string()
            }
            .kind(),
            ExtractionErrorKind::EngineUnavailable
        );
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(
            ExtractionError::Io(missing).kind(),
            ExtractionErrorKind::FileNotFound
        );
        assert_eq!(ExtractionErrorKind::EngineException.as_ref(), "engine_exception");
    }

    #[test]
    fn test_status_codes() {
        let err = ServiceError::DocumentNotFound {
            document_id: "x".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "document_not_found");

        let err = ServiceError::Processing(ProcessingError::FileTooLarge { size: 10, max: 5 });
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_format_error_chain() {
        let err = ServiceError::Processing(ProcessingError::Io(std::io::Error::other("disk full")));
        assert_eq!(
            format_error_chain_ref(&err),
            "Document processing failed: IO error: disk full"
        );
    }
}
