//! Document API endpoints.
//!
//! Handlers for uploading documents into a person's archive, reading stored
//! extraction results, downloading originals and re-queueing extraction.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::QueueRecord;
use crate::error::{I18nError, ProcessingError, ServiceError};
use crate::service::{DocumentView, UploadedDocument, UploadedFile};

use super::{AppState, MAX_FILES_PER_UPLOAD};

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub documents: Vec<UploadedDocument>,
}

/// Upload one or more documents for a person
pub async fn upload_documents_handler(
    State(state): State<Arc<AppState>>,
    Path(person_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, I18nError> {
    let mut files: Vec<UploadedFile> = Vec::new();
    let mut folder_id: Option<String> = None;
    let mut description = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| state.invalid_request(e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "files" | "file" => {
                if files.len() == MAX_FILES_PER_UPLOAD {
                    return Err(state.invalid_request(format!(
                        "At most {} files per upload",
                        MAX_FILES_PER_UPLOAD
                    )));
                }
                let file_name = field.file_name().unwrap_or("document").to_string();
                let data = field.bytes().await.map_err(|e| state.invalid_request(e))?;
                files.push(UploadedFile {
                    file_name,
                    content: data.to_vec(),
                });
            }
            "folder_id" => {
                let value = field.text().await.map_err(|e| state.invalid_request(e))?;
                if !value.trim().is_empty() {
                    folder_id = Some(value.trim().to_string());
                }
            }
            "description" => {
                description = field.text().await.map_err(|e| state.invalid_request(e))?;
            }
            _ => {}
        }
    }

    let documents = state
        .service
        .upload_documents(&person_id, files, folder_id.as_deref(), &description)
        .map_err(|e| state.i18n_error(e))?;

    Ok(Json(UploadResponse {
        success: true,
        documents,
    }))
}

/// Stored extraction results and metadata
pub async fn get_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>, I18nError> {
    let view = state
        .service
        .document_view(&id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(view))
}

/// The stored original file
pub async fn get_document_file_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, I18nError> {
    let (document, path) = state
        .service
        .document_file(&id)
        .map_err(|e| state.i18n_error(e))?;

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| state.i18n_error(ServiceError::Processing(ProcessingError::Io(e))))?;

    let mime = mime_guess::from_path(&document.file_name).first_or_octet_stream();

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.essence_str().to_string())],
        data,
    )
        .into_response())
}

/// Queue an unprocessed document for extraction again
pub async fn requeue_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<QueueRecord>), I18nError> {
    let record = state
        .service
        .requeue_document(&id)
        .map_err(|e| state.i18n_error(e))?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}
