//! Synchronous single-file extraction, bypassing the queue.

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::error::{ExtractionErrorKind, I18nError, ProcessingError, ServiceError};
use crate::ocr::{DetectedType, ExtractionResult, FileKind, TextMode};
use crate::storage;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct ExtractTextResponse {
    pub text: String,
    #[serde(rename = "type")]
    pub detected_type: DetectedType,
    pub file_type: FileKind,
    /// Rounded to two decimals
    pub confidence: f64,
    /// `success` or `error`
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExtractionErrorKind>,
}

impl From<ExtractionResult> for ExtractTextResponse {
    fn from(result: ExtractionResult) -> Self {
        Self {
            status: if result.is_error() { "error" } else { "success" },
            confidence: (result.confidence * 100.0).round() / 100.0,
            text: result.text,
            detected_type: result.detected_type,
            file_type: result.file_type,
            error: result.error,
        }
    }
}

/// Extract text from an uploaded file and return it directly.
///
/// The upload is written to a temporary file that is removed once
/// extraction finishes, whatever the outcome.
pub async fn extract_text_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ExtractTextResponse>, I18nError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut mode = TextMode::Auto;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| state.invalid_request(e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(|e| state.invalid_request(e))?;
                upload = Some((file_name, data.to_vec()));
            }
            "mode" => {
                let value = field.text().await.map_err(|e| state.invalid_request(e))?;
                mode = TextMode::from_str(value.trim())
                    .map_err(|_| state.invalid_request(format!("Unknown mode: {}", value)))?;
            }
            _ => {}
        }
    }

    let (file_name, content) = upload.ok_or_else(|| state.invalid_request("No file uploaded"))?;

    let dynamic = state.service.runtime_config.dynamic();
    let max_size = dynamic.limits.max_document_size_bytes;
    if content.len() as u64 > max_size {
        return Err(
            state.i18n_error(ServiceError::Processing(ProcessingError::FileTooLarge {
                size: content.len() as u64,
                max: max_size,
            })),
        );
    }
    let config = dynamic.ocr.clone();
    drop(dynamic);

    // Keep the extension so the classifier's fallback still applies
    let extension = storage::file_extension(&file_name);
    let suffix = if extension.is_empty() {
        String::new()
    } else {
        format!(".{}", extension)
    };
    let io_error = |e| state.i18n_error(ServiceError::Processing(ProcessingError::Io(e)));
    let staging = storage::staging_dir(state.service.data_dir()).map_err(io_error)?;
    let mut temp = tempfile::Builder::new()
        .prefix("parvande-extract-")
        .suffix(&suffix)
        .tempfile_in(staging)
        .map_err(io_error)?;
    temp.write_all(&content).map_err(io_error)?;
    temp.flush().map_err(io_error)?;
    let temp_path = temp.into_temp_path();

    let ocr = state.service.ocr.clone();
    let result = tokio::task::spawn_blocking(move || {
        let result = ocr.extract(&temp_path, mode, &config);
        drop(temp_path);
        result
    })
    .await
    .map_err(|e| {
        state.i18n_error(ServiceError::Internal {
            message: format!("Extraction task failed: {}", e),
        })
    })?;

    info!(
        file_name = %file_name,
        file_type = %result.file_type,
        detected_type = result.detected_type.as_ref(),
        confidence = result.confidence,
        "Inline extraction finished"
    );

    Ok(Json(result.into()))
}
