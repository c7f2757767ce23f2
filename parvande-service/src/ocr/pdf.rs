//! PDF extraction: embedded page text where present, rendering and
//! recognition for pages without it.

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

use super::engine::{EngineState, ThresholdPair};
use super::raster::join_spans;
use crate::config::OcrConfig;
use crate::error::ExtractionError;
use crate::i18n::I18n;

/// Per-page access to a PDF
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Text layer of a page (zero-based), possibly empty
    fn embedded_text(&self, index: usize) -> Result<String, ExtractionError>;

    /// Rasterize a page (zero-based) at the given resolution
    fn render(&self, index: usize, dpi: f32) -> Result<DynamicImage, ExtractionError>;
}

/// Assembled PDF text
#[derive(Debug, Clone)]
pub struct PdfText {
    pub text: String,
    /// Mean of per-page confidences; 0 for a document without pages
    pub confidence: f64,
    pub pages: usize,
    pub recognized_pages: usize,
}

/// Create a new Pdfium instance (dynamically linked).
///
/// Searches for libpdfium in:
/// 1. Current directory (./libpdfium.so)
/// 2. vendor/pdfium/lib/
/// 3. System library paths
pub fn create_pdfium() -> Result<Pdfium, ExtractionError> {
    // Try local paths first, then system
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ExtractionError::PdfLibrary {
            message: format!("{:?}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// [`PageSource`] backed by a loaded pdfium document
pub struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumPages<'a> {
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self, ExtractionError> {
        let document =
            pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| ExtractionError::Pdf {
                    page: 0,
                    message: format!("Failed to load PDF: {:?}", e),
                })?;

        Ok(Self { document })
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>, ExtractionError> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| ExtractionError::Pdf {
                page: index as u32 + 1,
                message: format!("Failed to get page: {}", e),
            })
    }
}

impl PageSource for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn embedded_text(&self, index: usize) -> Result<String, ExtractionError> {
        let page = self.page(index)?;
        let text = page.text().map_err(|e| ExtractionError::Pdf {
            page: index as u32 + 1,
            message: format!("Failed to extract text: {:?}", e),
        })?;
        Ok(text.all())
    }

    fn render(&self, index: usize, dpi: f32) -> Result<DynamicImage, ExtractionError> {
        let page = self.page(index)?;

        // Page dimensions are in points
        let pixels_per_point = dpi / 72.0;
        let width = (page.width().value * pixels_per_point).ceil() as i32;
        let height = (page.height().value * pixels_per_point).ceil() as i32;

        let config = PdfRenderConfig::new()
            .set_target_width(width.max(1))
            .set_target_height(height.max(1));

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::Pdf {
                page: index as u32 + 1,
                message: format!("Failed to render page: {}", e),
            })?;

        Ok(bitmap.as_image())
    }
}

/// Extract a PDF file from disk
pub fn extract_pdf_file(
    path: &Path,
    engine: &EngineState,
    config: &OcrConfig,
    i18n: &I18n,
    locale: &str,
) -> Result<PdfText, ExtractionError> {
    let pdfium = create_pdfium()?;
    let pages = PdfiumPages::open(&pdfium, path)?;
    assemble(&pages, engine, config, i18n, locale)
}

/// Walk the pages in order, producing one headed section per page.
///
/// Pages with a text layer are kept verbatim at confidence 1.0. Other pages
/// are rendered and recognized with the handwriting thresholds and no
/// preprocessing. The first failure aborts the whole document.
pub fn assemble(
    pages: &dyn PageSource,
    engine: &EngineState,
    config: &OcrConfig,
    i18n: &I18n,
    locale: &str,
) -> Result<PdfText, ExtractionError> {
    let page_count = pages.page_count();
    info!(pages = page_count, "Processing PDF pages");

    let thresholds = ThresholdPair::handwritten(config);
    let mut sections = Vec::with_capacity(page_count);
    let mut confidence_sum = 0.0;
    let mut recognized_pages = 0;

    for index in 0..page_count {
        let page_num = (index + 1).to_string();
        let embedded = pages.embedded_text(index)?;

        if !embedded.trim().is_empty() {
            let header = i18n.format(locale, "ocr-page-header", &[("page", &page_num)]);
            sections.push(format!("{}\n{}", header, embedded));
            confidence_sum += 1.0;
            continue;
        }

        debug!(page = index + 1, "No text layer, recognizing rendered page");
        let recognizer = engine.engine()?;
        let image = pages.render(index, config.pdf_render_dpi)?;
        let spans = recognizer.recognize(&image.to_luma8(), &thresholds)?;
        let (text, confidence) = join_spans(&spans, thresholds.text_threshold);
        recognized_pages += 1;

        let body = if text.is_empty() {
            i18n.get(locale, "ocr-page-no-text", None)
        } else {
            text
        };
        let header = i18n.format(locale, "ocr-page-header-ocr", &[("page", &page_num)]);
        sections.push(format!("{}\n{}", header, body));
        confidence_sum += confidence;
    }

    let confidence = if page_count == 0 {
        0.0
    } else {
        (confidence_sum / page_count as f64).clamp(0.0, 1.0)
    };

    Ok(PdfText {
        text: sections.join("\n").trim().to_string(),
        confidence,
        pages: page_count,
        recognized_pages,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::FakePages;
    use super::*;
    use crate::ocr::engine::testing::{FailingEngine, RecordingEngine};
    use std::sync::Arc;

    fn unavailable() -> EngineState {
        EngineState::Unavailable {
            reason: "test".to_string(),
        }
    }

    #[test]
    fn test_embedded_text_only_never_touches_engine() {
        let recorder = RecordingEngine::new(&[("should not appear", 0.9)]);
        let engine = EngineState::Ready(recorder.clone());
        let pages = FakePages::new(&[Some("بند اول"), Some("  بند دوم\n")]);
        let i18n = I18n::new("fa");

        let result = assemble(&pages, &engine, &OcrConfig::default(), &i18n, "fa").unwrap();

        assert_eq!(
            result.text,
            "--- صفحه 1 ---\nبند اول\n--- صفحه 2 ---\n  بند دوم"
        );
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.recognized_pages, 0);
        assert_eq!(recorder.call_count(), 0);
        assert_eq!(pages.renders.get(), 0);
    }

    #[test]
    fn test_embedded_text_works_without_engine() {
        let pages = FakePages::new(&[Some("page one")]);
        let i18n = I18n::new("en");

        let result = assemble(&pages, &unavailable(), &OcrConfig::default(), &i18n, "en").unwrap();
        assert_eq!(result.text, "--- Page 1 ---\npage one");
    }

    #[test]
    fn test_scanned_page_is_recognized_with_lenient_thresholds() {
        let recorder = RecordingEngine::new(&[("اسکن", 0.6), ("faint", 0.2)]);
        let engine = EngineState::Ready(recorder.clone());
        let pages = FakePages::new(&[Some("متن"), None]);
        let i18n = I18n::new("fa");

        let result = assemble(&pages, &engine, &OcrConfig::default(), &i18n, "fa").unwrap();

        assert_eq!(result.text, "--- صفحه 1 ---\nمتن\n--- صفحه 2 (OCR) ---\nاسکن");
        assert_eq!(result.recognized_pages, 1);
        assert_eq!(
            recorder.calls.lock().unwrap().as_slice(),
            &[ThresholdPair {
                text_threshold: 0.2,
                low_text: 0.1
            }]
        );
        // (1.0 + 0.6) / 2
        assert!((result.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_scanned_page_without_words_gets_placeholder() {
        let engine = EngineState::Ready(RecordingEngine::new(&[]));
        let pages = FakePages::new(&[None]);
        let i18n = I18n::new("fa");

        let result = assemble(&pages, &engine, &OcrConfig::default(), &i18n, "fa").unwrap();
        assert_eq!(result.text, "--- صفحه 1 (OCR) ---\nمتنی یافت نشد");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_failures_abort_the_document() {
        let pages = FakePages::new(&[Some("ok"), None]);
        let i18n = I18n::new("fa");

        let err = assemble(&pages, &unavailable(), &OcrConfig::default(), &i18n, "fa").unwrap_err();
        assert!(matches!(err, ExtractionError::EngineUnavailable { .. }));

        let failing = EngineState::Ready(Arc::new(FailingEngine));
        let err = assemble(&pages, &failing, &OcrConfig::default(), &i18n, "fa").unwrap_err();
        assert!(matches!(err, ExtractionError::Engine { .. }));
    }

    #[test]
    fn test_empty_document() {
        let pages = FakePages::new(&[]);
        let i18n = I18n::new("fa");
        let result = assemble(&pages, &unavailable(), &OcrConfig::default(), &i18n, "fa").unwrap();
        assert!(result.text.is_empty());
        assert_eq!(result.confidence, 0.0);
    }
}
