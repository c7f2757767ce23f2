//! Background OCR queue worker.
//!
//! One task polls for pending queue records and processes them strictly one
//! at a time. Each record goes pending -> processing before extraction starts
//! and ends in completed (document updated in the same transaction) or failed
//! (document untouched).

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ArchiveService;
use crate::db::PendingItem;
use crate::error::{ServiceResult, format_error_chain_ref};
use crate::ocr::TextMode;

const STALE_REASON: &str = "Interrupted while processing";

/// How a single queue item ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed,
    Failed,
    /// The record was no longer pending when the worker reached it
    Skipped,
}

impl ArchiveService {
    /// Fail records left in `processing` by a previous run
    pub fn recover_stale_queue_items(&self) -> ServiceResult<usize> {
        let count = self.db.fail_stale_processing(STALE_REASON)?;
        if count > 0 {
            warn!(count, "Failed queue items interrupted by a previous shutdown");
        }
        Ok(count)
    }

    /// Start the OCR queue worker.
    /// This should be called once on server startup.
    pub fn start_queue_worker(
        service: Arc<ArchiveService>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("OCR queue worker started");
            while !shutdown.is_cancelled() {
                let outcome = service.process_pending(&shutdown).await;

                let worker_config = service.runtime_config.dynamic().worker.clone();
                let delay = match outcome {
                    Ok(0) => {
                        debug!("No pending queue items");
                        worker_config.poll_interval()
                    }
                    Ok(processed) => {
                        info!(processed, "Queue pass finished");
                        worker_config.poll_interval()
                    }
                    Err(e) => {
                        error!(error = %format_error_chain_ref(&e), "Failed to process scan queue");
                        worker_config.error_backoff()
                    }
                };

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            info!("OCR queue worker stopped");
        })
    }

    /// One polling pass: every pending record, oldest first. Stops early,
    /// between items, once shutdown is requested. Returns the number of
    /// items processed.
    pub async fn process_pending(&self, shutdown: &CancellationToken) -> ServiceResult<usize> {
        let pending = self.db.list_pending_items()?;
        if !pending.is_empty() {
            info!(count = pending.len(), "Pending queue items");
        }

        let mut processed = 0;
        for item in pending {
            if shutdown.is_cancelled() {
                break;
            }
            if self.process_queue_item(item).await? != ItemOutcome::Skipped {
                processed += 1;
            }
        }
        Ok(processed)
    }

    /// Process one queue record to a terminal state
    pub async fn process_queue_item(&self, item: PendingItem) -> ServiceResult<ItemOutcome> {
        let PendingItem { record, document } = item;

        if !self.db.mark_queue_processing(&record.id)? {
            debug!(queue_id = %record.id, "Queue item no longer pending, skipping");
            return Ok(ItemOutcome::Skipped);
        }
        info!(
            doc_id = %document.id,
            queue_id = %record.id,
            file_name = %document.file_name,
            "Processing queued document"
        );

        let path = self.resolve_path(&document.file_path);
        if !path.is_file() {
            let reason = format!("File not found: {}", document.file_path);
            return self.fail_item(&record.id, &document.id, &reason);
        }

        let config = self.runtime_config.dynamic().ocr.clone();
        let ocr = self.ocr.clone();
        let started = Instant::now();
        let joined =
            tokio::task::spawn_blocking(move || ocr.extract(&path, TextMode::Auto, &config)).await;
        metrics::histogram!("parvande_extraction_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                let reason = format!("Extraction task failed: {}", e);
                return self.fail_item(&record.id, &document.id, &reason);
            }
        };

        if let Some(kind) = result.error {
            let reason = format!("{}: {}", kind.as_ref(), result.text);
            return self.fail_item(&record.id, &document.id, &reason);
        }

        if !self.db.complete_queue_item(
            &record.id,
            &document.id,
            &result.text,
            result.confidence,
        )? {
            warn!(queue_id = %record.id, "Queue item left processing before completion");
            return Ok(ItemOutcome::Skipped);
        }

        metrics::counter!("parvande_queue_items_total", "status" => "completed").increment(1);
        info!(
            doc_id = %document.id,
            queue_id = %record.id,
            file_type = %result.file_type,
            detected_type = result.detected_type.as_ref(),
            confidence = result.confidence,
            "Document text extracted"
        );
        Ok(ItemOutcome::Completed)
    }

    fn fail_item(
        &self,
        queue_id: &str,
        document_id: &str,
        reason: &str,
    ) -> ServiceResult<ItemOutcome> {
        self.db.fail_queue_item(queue_id, reason)?;
        metrics::counter!("parvande_queue_items_total", "status" => "failed").increment(1);
        error!(doc_id = %document_id, queue_id = %queue_id, reason, "Queue item failed");
        Ok(ItemOutcome::Failed)
    }
}
