//! Archive service coordinator.
//!
//! Owns the database, runtime configuration, OCR service and localization,
//! and exposes the operations used by the HTTP layer and the queue worker.

mod documents;
mod folders;
mod persons;
mod search;
mod worker;

pub use documents::{DocumentView, UploadedDocument, UploadedFile};
pub use folders::{FolderContents, FolderNode, FolderSummary, NewFolder};
pub use persons::{DocumentSummary, PersonDetail};
pub use search::{DocumentHit, SearchParams, SearchResults};

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::RuntimeConfig;
use crate::db::{Database, QueueCounts};
use crate::error::ServiceResult;
use crate::i18n::I18n;
use crate::ocr::OcrService;

/// Main service coordinator
pub struct ArchiveService {
    pub runtime_config: Arc<RuntimeConfig>,
    pub db: Arc<Database>,
    pub ocr: Arc<OcrService>,
    pub i18n: Arc<I18n>,
}

/// Queue counters plus recognition engine availability
#[derive(Debug, Clone, Serialize)]
pub struct QueueOverview {
    #[serde(flatten)]
    pub counts: QueueCounts,
    pub engine_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_unavailable_reason: Option<String>,
}

impl ArchiveService {
    pub fn new(
        db: Arc<Database>,
        runtime_config: Arc<RuntimeConfig>,
        ocr: Arc<OcrService>,
        i18n: Arc<I18n>,
    ) -> Self {
        info!(
            engine_available = ocr.engine().is_available(),
            "Initializing Parvande archive service"
        );

        Self {
            runtime_config,
            db,
            ocr,
            i18n,
        }
    }

    /// Locale used for user-facing messages and placeholder text
    pub fn locale(&self) -> &str {
        &self.runtime_config.static_config.server.locale
    }

    pub fn data_dir(&self) -> &Path {
        &self.runtime_config.static_config.storage.data_dir
    }

    /// Absolute location of a stored document path
    pub fn resolve_path(&self, stored: &str) -> PathBuf {
        self.data_dir().join(stored)
    }

    /// Update settings and hot-reload the dynamic configuration
    pub fn update_settings(
        &self,
        updates: HashMap<String, serde_json::Value>,
    ) -> ServiceResult<()> {
        // Persist to DB
        self.db.set_settings(updates)?;

        // Worker and extraction read a fresh snapshot per item
        self.runtime_config.reload_from_db(&self.db)?;

        Ok(())
    }

    pub fn queue_overview(&self) -> ServiceResult<QueueOverview> {
        let engine = self.ocr.engine();
        Ok(QueueOverview {
            counts: self.db.queue_counts()?,
            engine_available: engine.is_available(),
            engine_unavailable_reason: engine.unavailable_reason().map(str::to_string),
        })
    }
}
